use dr_session::InferenceSession;
use dr_tflite::TfLiteRuntime;

/// Opaque session handle returned by `dr_session_create`.
pub struct DRSession {
    pub session: InferenceSession<TfLiteRuntime>,
}

impl DRSession {
    pub fn new(session: InferenceSession<TfLiteRuntime>) -> Self {
        Self { session }
    }
}

/// Threads for CPU work when the caller passes 0: half the available
/// processors, at least one.
pub fn default_num_threads() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() / 2)
        .unwrap_or(1)
        .max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_num_threads() {
        let n = default_num_threads();
        assert!(n >= 1);
        if let Ok(p) = std::thread::available_parallelism() {
            assert_eq!(n, (p.get() / 2).max(1));
        }
    }
}
