use std::collections::HashMap;

use crate::backend::BackendKind;
use crate::error::NativeError;
use crate::runtime::DelegateContext;

/// Builds delegates of one backend kind.
pub trait DelegateFactory<D>: Send + Sync {
    fn kind(&self) -> BackendKind;
    fn create(&self, ctx: &DelegateContext<'_>) -> Result<D, NativeError>;
}

/// Maps each backend kind to the factory that constructs it.
///
/// Runtimes route `create_delegate` through a registry so that adding a
/// backend means registering a factory, not changing the fallback walk.
pub struct DelegateRegistry<D> {
    factories: HashMap<BackendKind, Box<dyn DelegateFactory<D>>>,
}

impl<D> DelegateRegistry<D> {
    pub fn new() -> Self {
        DelegateRegistry {
            factories: HashMap::new(),
        }
    }

    /// Register a factory, returning the one it replaced, if any.
    pub fn register(
        &mut self,
        factory: impl DelegateFactory<D> + 'static,
    ) -> Option<Box<dyn DelegateFactory<D>>> {
        self.factories.insert(factory.kind(), Box::new(factory))
    }

    pub fn unregister(&mut self, kind: BackendKind) -> Option<Box<dyn DelegateFactory<D>>> {
        self.factories.remove(&kind)
    }

    pub fn contains(&self, kind: BackendKind) -> bool {
        self.factories.contains_key(&kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<BackendKind> {
        let mut kinds: Vec<BackendKind> = self.factories.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Build a delegate of `kind`.
    ///
    /// # Errors
    /// [`NativeError::Unsupported`] if no factory is registered for `kind`,
    /// otherwise whatever the factory reports.
    pub fn create(&self, kind: BackendKind, ctx: &DelegateContext<'_>) -> Result<D, NativeError> {
        let factory = self
            .factories
            .get(&kind)
            .ok_or(NativeError::Unsupported(kind))?;
        factory.create(ctx)
    }
}

impl<D> Default for DelegateRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelHandle;
    use crate::runtime::PlatformPaths;

    struct Fixed(BackendKind, u32);

    impl DelegateFactory<u32> for Fixed {
        fn kind(&self) -> BackendKind {
            self.0
        }

        fn create(&self, _ctx: &DelegateContext<'_>) -> Result<u32, NativeError> {
            Ok(self.1)
        }
    }

    #[test]
    fn test_create_routes_by_kind() {
        let model = ModelHandle::new(vec![0], "h").unwrap();
        let paths = PlatformPaths::default();
        let ctx = DelegateContext {
            model: &model,
            paths: &paths,
            num_threads: 1,
        };

        let mut registry = DelegateRegistry::new();
        assert!(registry.register(Fixed(BackendKind::Gpu, 7)).is_none());
        registry.register(Fixed(BackendKind::NeuralProcessor, 9));

        assert_eq!(registry.create(BackendKind::Gpu, &ctx).unwrap(), 7);
        assert_eq!(registry.create(BackendKind::NeuralProcessor, &ctx).unwrap(), 9);
        assert!(matches!(
            registry.create(BackendKind::CpuBaseline, &ctx),
            Err(NativeError::Unsupported(BackendKind::CpuBaseline))
        ));
        assert_eq!(
            registry.kinds(),
            vec![BackendKind::NeuralProcessor, BackendKind::Gpu]
        );
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = DelegateRegistry::new();
        registry.register(Fixed(BackendKind::Gpu, 1));
        assert!(registry.register(Fixed(BackendKind::Gpu, 2)).is_some());
        assert!(registry.unregister(BackendKind::Gpu).is_some());
        assert!(!registry.contains(BackendKind::Gpu));
    }
}
