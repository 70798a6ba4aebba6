use tracing::warn;

use crate::backend::BackendKind;
use crate::error::NativeError;
use crate::runtime::Delegate;

/// Exclusive owner of one live delegate.
///
/// The delegate is released exactly once: by [`release`](Self::release), or
/// on drop if that was never called. Release failures during drop are
/// logged, not propagated.
pub struct BackendHandle<D: Delegate> {
    delegate: D,
    released: bool,
}

impl<D: Delegate> BackendHandle<D> {
    pub fn new(delegate: D) -> Self {
        BackendHandle {
            delegate,
            released: false,
        }
    }

    pub fn kind(&self) -> BackendKind {
        self.delegate.kind()
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    /// Release the delegate now and report the outcome.
    pub fn release(mut self) -> Result<(), NativeError> {
        self.release_once()
    }

    fn release_once(&mut self) -> Result<(), NativeError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.delegate.release()
    }
}

impl<D: Delegate> Drop for BackendHandle<D> {
    fn drop(&mut self) {
        let kind = self.kind();
        if let Err(e) = self.release_once() {
            warn!(backend = %kind, error = %e, "failed to release backend");
        }
    }
}

/// The backend handles of one tier, in the order they were created.
pub struct BackendHandles<D: Delegate> {
    handles: Vec<BackendHandle<D>>,
}

impl<D: Delegate> BackendHandles<D> {
    pub fn with_capacity(n: usize) -> Self {
        BackendHandles {
            handles: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, handle: BackendHandle<D>) {
        self.handles.push(handle);
    }

    pub fn get(&self, kind: BackendKind) -> Option<&BackendHandle<D>> {
        self.handles.iter().find(|h| h.kind() == kind)
    }

    pub fn contains(&self, kind: BackendKind) -> bool {
        self.get(kind).is_some()
    }

    pub fn kinds(&self) -> Vec<BackendKind> {
        self.handles.iter().map(BackendHandle::kind).collect()
    }

    /// Borrow the delegates in creation order, for binding to an interpreter.
    pub fn delegates(&self) -> Vec<&D> {
        self.handles.iter().map(BackendHandle::delegate).collect()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Release every handle, newest first. A failure does not stop the
    /// remaining releases; each one is logged and returned.
    pub fn release_all(mut self) -> Vec<(BackendKind, NativeError)> {
        let mut failures = Vec::new();
        while let Some(handle) = self.handles.pop() {
            let kind = handle.kind();
            if let Err(e) = handle.release() {
                warn!(backend = %kind, error = %e, "failed to release backend");
                failures.push((kind, e));
            }
        }
        failures
    }
}

impl<D: Delegate> Drop for BackendHandles<D> {
    fn drop(&mut self) {
        // Newest first, matching release_all.
        while let Some(handle) = self.handles.pop() {
            drop(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Counting {
        kind: BackendKind,
        releases: Arc<Mutex<Vec<BackendKind>>>,
        fail: bool,
    }

    impl Delegate for Counting {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        fn release(&mut self) -> Result<(), NativeError> {
            self.releases.lock().unwrap().push(self.kind);
            if self.fail {
                return Err(NativeError::Status {
                    call: "delete",
                    status: 1,
                });
            }
            Ok(())
        }
    }

    fn counting(
        kind: BackendKind,
        releases: &Arc<Mutex<Vec<BackendKind>>>,
        fail: bool,
    ) -> BackendHandle<Counting> {
        BackendHandle::new(Counting {
            kind,
            releases: releases.clone(),
            fail,
        })
    }

    #[test]
    fn test_release_then_drop_releases_once() {
        let releases = Arc::new(Mutex::new(Vec::new()));
        let h = counting(BackendKind::Gpu, &releases, false);
        h.release().unwrap();
        assert_eq!(*releases.lock().unwrap(), vec![BackendKind::Gpu]);
    }

    #[test]
    fn test_drop_releases() {
        let releases = Arc::new(Mutex::new(Vec::new()));
        drop(counting(BackendKind::NeuralProcessor, &releases, false));
        assert_eq!(*releases.lock().unwrap(), vec![BackendKind::NeuralProcessor]);
    }

    #[test]
    fn test_release_all_continues_past_failures() {
        let releases = Arc::new(Mutex::new(Vec::new()));
        let mut set = BackendHandles::with_capacity(2);
        set.push(counting(BackendKind::NeuralProcessor, &releases, false));
        set.push(counting(BackendKind::Gpu, &releases, true));
        assert_eq!(
            set.kinds(),
            vec![BackendKind::NeuralProcessor, BackendKind::Gpu]
        );

        let failures = set.release_all();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, BackendKind::Gpu);
        assert_eq!(
            *releases.lock().unwrap(),
            vec![BackendKind::Gpu, BackendKind::NeuralProcessor]
        );
    }
}
