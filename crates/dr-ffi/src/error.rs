use std::cell::RefCell;
use std::ffi::CString;

use dr_delegate::InitError;
use dr_session::SessionError;

use crate::types::DRStatus;

thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Store an error message for later retrieval via `dr_last_error`.
pub fn set_last_error(msg: String) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Take the last error message, leaving `None` in its place.
pub fn take_last_error() -> Option<CString> {
    LAST_ERROR.with(|e| e.borrow_mut().take())
}

/// Record `err` as the last error and map it to a status code.
pub(crate) fn report(err: &SessionError) -> DRStatus {
    set_last_error(err.to_string());
    match err {
        SessionError::Init(InitError::ModelLoad(_) | InitError::Io(_)) => DRStatus::ErrorModelLoad,
        SessionError::Init(InitError::ExhaustedFallback { .. }) => DRStatus::ErrorInit,
        SessionError::Closed => DRStatus::ErrorClosed,
        SessionError::InputCount(_) | SessionError::InputSize { .. } => {
            DRStatus::ErrorInvalidArgument
        }
        SessionError::Inference(_) | SessionError::Metadata(_) | SessionError::Tensor(_) => {
            DRStatus::ErrorInference
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_error_is_taken_once() {
        set_last_error("boom".to_string());
        assert_eq!(take_last_error().unwrap().to_str().unwrap(), "boom");
        assert!(take_last_error().is_none());
    }

    #[test]
    fn test_report_maps_status() {
        assert_eq!(report(&SessionError::Closed), DRStatus::ErrorClosed);
        assert_eq!(
            report(&SessionError::InputSize {
                expected: 4,
                got: 3
            }),
            DRStatus::ErrorInvalidArgument
        );
        assert_eq!(
            report(&SessionError::Init(InitError::ExhaustedFallback {
                attempts: vec![]
            })),
            DRStatus::ErrorInit
        );
        assert_eq!(
            take_last_error().unwrap().to_str().unwrap(),
            "initialization failed: no delegate tier could be initialized: priority order is empty"
        );
    }
}
