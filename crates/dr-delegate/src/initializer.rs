//! Cascading delegate initialization.
//!
//! [`DelegateInitializer`] walks a [`PriorityOrder`] one tier at a time.
//! A tier is accepted only if every one of its backends constructs and an
//! interpreter can be built on top of them; otherwise everything created
//! for that tier is released and the next tier is tried.

use tracing::{debug, info, warn};

use crate::backend::{PriorityOrder, Tier};
use crate::error::{DelegateInitError, InitError, NativeError};
use crate::handle::{BackendHandle, BackendHandles};
use crate::model::ModelHandle;
use crate::runtime::{DelegateContext, PlatformPaths, Runtime};

/// Settings supplied by the platform-integration layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOptions {
    /// Threads for operations that stay on the CPU.
    pub num_threads: usize,
    pub paths: PlatformPaths,
}

impl Default for InitOptions {
    fn default() -> Self {
        Self {
            num_threads: 1,
            paths: PlatformPaths::default(),
        }
    }
}

/// The configuration a successful initialization settled on.
///
/// Fields drop in declaration order: the interpreter goes before the
/// backend handles it may reference.
pub struct Initialized<R: Runtime> {
    pub interpreter: R::Interpreter,
    pub backends: BackendHandles<R::Delegate>,
    pub tier: Tier,
}

pub struct DelegateInitializer<'r, R: Runtime> {
    runtime: &'r R,
}

impl<'r, R: Runtime> DelegateInitializer<'r, R> {
    pub fn new(runtime: &'r R) -> Self {
        DelegateInitializer { runtime }
    }

    /// Initialize an interpreter with the first tier of `order` that works.
    ///
    /// # Errors
    ///
    /// - [`InitError::ModelLoad`] if the runtime cannot parse the model.
    /// - [`InitError::ExhaustedFallback`] if every tier failed. This cannot
    ///   happen for orders containing the baseline tier unless the runtime
    ///   itself is broken.
    pub fn initialize(
        &self,
        model: &ModelHandle,
        order: &PriorityOrder,
        options: &InitOptions,
    ) -> Result<Initialized<R>, InitError> {
        if !order.has_baseline() {
            warn!(
                order = ?order.tiers(),
                "priority order has no CPU-only tier; initialization may fail"
            );
        }

        let native_model = self
            .runtime
            .load_model(model)
            .map_err(|e| InitError::ModelLoad(e.to_string()))?;

        let ctx = DelegateContext {
            model,
            paths: &options.paths,
            num_threads: options.num_threads.max(1),
        };

        let mut attempts = Vec::new();
        for tier in order {
            debug!(runtime = self.runtime.name(), tier = %tier, "trying delegate tier");
            match self.try_tier(&native_model, tier, &ctx) {
                Ok(init) => {
                    info!(
                        runtime = self.runtime.name(),
                        tier = %tier,
                        failed_tiers = attempts.len(),
                        "interpreter initialized"
                    );
                    return Ok(init);
                }
                Err(source) => {
                    warn!(tier = %tier, error = %source, "delegate tier failed, falling back");
                    attempts.push(DelegateInitError {
                        tier: tier.clone(),
                        source,
                    });
                }
            }
        }
        Err(InitError::ExhaustedFallback { attempts })
    }

    /// Build every backend of `tier`, then an interpreter over them.
    ///
    /// On any error the handles created so far are dropped, which releases
    /// them; nothing from a failed tier survives.
    fn try_tier(
        &self,
        model: &R::Model,
        tier: &Tier,
        ctx: &DelegateContext<'_>,
    ) -> Result<Initialized<R>, NativeError> {
        let mut backends = BackendHandles::with_capacity(tier.len());
        for &kind in tier.kinds() {
            let delegate = self.runtime.create_delegate(kind, ctx)?;
            backends.push(BackendHandle::new(delegate));
        }
        let interpreter =
            self.runtime
                .create_interpreter(model, &backends.delegates(), ctx.num_threads)?;
        Ok(Initialized {
            interpreter,
            backends,
            tier: tier.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendKind::{self, *};
    use crate::mock::{MockEvent, MockRuntime};

    fn model() -> ModelHandle {
        ModelHandle::new(vec![1, 2, 3, 4], "model-hash").unwrap()
    }

    fn init(rt: &MockRuntime, order: &PriorityOrder) -> Result<Initialized<MockRuntime>, InitError> {
        DelegateInitializer::new(rt).initialize(&model(), order, &InitOptions::default())
    }

    #[test]
    fn test_first_tier_wins_when_everything_works() {
        let rt = MockRuntime::new();
        let init = init(&rt, &PriorityOrder::accelerated_default()).unwrap();
        assert_eq!(init.tier, Tier::new([NeuralProcessor, Gpu]));
        assert_eq!(init.backends.kinds(), vec![NeuralProcessor, Gpu]);
    }

    #[test]
    fn test_npu_failure_falls_back_to_gpu() {
        let rt = MockRuntime::new().unavailable(NeuralProcessor);
        let init = init(&rt, &PriorityOrder::accelerated_default()).unwrap();

        assert_eq!(init.tier, Tier::new([Gpu]));
        assert!(!init.backends.contains(NeuralProcessor));
        assert_eq!(init.backends.kinds(), vec![Gpu]);
        // The first tier failed on its first backend, so no GPU handle was
        // made for it; the only GPU handle is the live one.
        assert_eq!(rt.log().count(&MockEvent::DelegateCreated(Gpu)), 1);
        assert_eq!(rt.log().count(&MockEvent::DelegateReleased(Gpu)), 0);
    }

    #[test]
    fn test_partial_tier_is_released() {
        // GPU constructs first, then NPU fails: the GPU handle from the
        // failed attempt must be released before the next tier.
        let rt = MockRuntime::new().unavailable(NeuralProcessor);
        let order = PriorityOrder::new(vec![
            Tier::new([Gpu, NeuralProcessor]),
            Tier::new([Gpu]),
            Tier::baseline(),
        ]);
        let init = init(&rt, &order).unwrap();

        assert_eq!(init.tier, Tier::new([Gpu]));
        assert_eq!(
            rt.log().events(),
            vec![
                MockEvent::ModelLoaded,
                MockEvent::DelegateCreated(Gpu),
                MockEvent::DelegateReleased(Gpu),
                MockEvent::DelegateCreated(Gpu),
                MockEvent::InterpreterCreated(vec![Gpu]),
            ]
        );
    }

    #[test]
    fn test_interpreter_failure_discards_tier() {
        let rt = MockRuntime::new().reject_interpreter(&[NeuralProcessor, Gpu]);
        let init = init(&rt, &PriorityOrder::accelerated_default()).unwrap();

        assert_eq!(init.tier, Tier::new([Gpu]));
        assert_eq!(rt.log().count(&MockEvent::DelegateReleased(NeuralProcessor)), 1);
        assert_eq!(rt.log().count(&MockEvent::DelegateReleased(Gpu)), 1);
    }

    #[test]
    fn test_baseline_always_succeeds() {
        let orders = [
            PriorityOrder::accelerated_default(),
            PriorityOrder::gpu_only(),
            PriorityOrder::cpu_only(),
            PriorityOrder::new(vec![
                Tier::new([CpuBaseline, Gpu]),
                Tier::new([NeuralProcessor]),
                Tier::new([CpuBaseline]),
                Tier::baseline(),
            ]),
        ];
        for order in &orders {
            let rt = BackendKind::ALL
                .into_iter()
                .fold(MockRuntime::new(), MockRuntime::unavailable);
            let init = init(&rt, order).unwrap();
            assert!(init.tier.is_baseline());
            assert!(init.backends.is_empty());
        }
    }

    #[test]
    fn test_exhausted_without_baseline() {
        let rt = MockRuntime::new().unavailable(NeuralProcessor);
        let order = PriorityOrder::new(vec![Tier::new([NeuralProcessor])]);
        match init(&rt, &order) {
            Err(InitError::ExhaustedFallback { attempts }) => {
                assert_eq!(attempts.len(), 1);
                assert_eq!(attempts[0].tier, Tier::new([NeuralProcessor]));
                assert!(matches!(
                    attempts[0].source,
                    NativeError::Unavailable {
                        kind: NeuralProcessor,
                        ..
                    }
                ));
            }
            Err(e) => panic!("unexpected error: {}", e),
            Ok(_) => panic!("expected exhausted fallback"),
        }
    }

    #[test]
    fn test_unregistered_kind_falls_back() {
        let rt = MockRuntime::new().without_factory(CpuBaseline);
        let order = PriorityOrder::new(vec![Tier::new([CpuBaseline]), Tier::baseline()]);
        let init = init(&rt, &order).unwrap();
        assert!(init.tier.is_baseline());
    }

    #[test]
    fn test_model_load_failure_is_fatal() {
        let rt = MockRuntime::new().reject_model();
        let err = init(&rt, &PriorityOrder::accelerated_default()).err().unwrap();
        assert!(matches!(err, InitError::ModelLoad(_)));
        assert!(rt.log().events().is_empty());
    }

    #[test]
    fn test_dropping_initialized_frees_interpreter_first() {
        let rt = MockRuntime::new();
        let init = init(&rt, &PriorityOrder::accelerated_default()).unwrap();
        rt.log().clear();
        drop(init);
        assert_eq!(
            rt.log().events(),
            vec![
                MockEvent::InterpreterDropped,
                MockEvent::DelegateReleased(Gpu),
                MockEvent::DelegateReleased(NeuralProcessor),
            ]
        );
    }
}
