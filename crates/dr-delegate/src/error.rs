use std::fmt;

use thiserror::Error;

use crate::backend::{BackendKind, Tier};

/// Failure reported by a native runtime or one of its delegates.
#[derive(Error, Debug)]
pub enum NativeError {
    #[error("failed to load library {path}: {reason}")]
    LibraryNotFound { path: String, reason: String },
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),
    #[error("{call} failed (status {status})")]
    Status { call: &'static str, status: i32 },
    #[error("{0} returned null")]
    NullHandle(&'static str),
    #[error("no factory registered for the {0} backend")]
    Unsupported(BackendKind),
    #[error("{kind} backend unavailable: {reason}")]
    Unavailable { kind: BackendKind, reason: String },
    #[error("tensor index {index} out of range (have {count})")]
    InvalidIndex { index: usize, count: usize },
    #[error("buffer size mismatch: expected {expected} bytes, got {got}")]
    SizeMismatch { expected: usize, got: usize },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("tensor error: {0}")]
    Tensor(#[from] dr_tensor::TensorError),
}

/// One tier's failed attempt. Recovered from by trying the next tier.
#[derive(Error, Debug)]
#[error("tier {tier} failed: {source}")]
pub struct DelegateInitError {
    pub tier: Tier,
    #[source]
    pub source: NativeError,
}

#[derive(Error, Debug)]
pub enum InitError {
    #[error("failed to load model: {0}")]
    ModelLoad(String),
    #[error("failed to read model: {0}")]
    Io(#[from] std::io::Error),
    #[error("no delegate tier could be initialized: {}", Attempts(.attempts))]
    ExhaustedFallback { attempts: Vec<DelegateInitError> },
}

struct Attempts<'a>(&'a [DelegateInitError]);

impl fmt::Display for Attempts<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "priority order is empty");
        }
        for (i, attempt) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}", attempt)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausted_lists_every_tier() {
        let err = InitError::ExhaustedFallback {
            attempts: vec![
                DelegateInitError {
                    tier: Tier::new([BackendKind::NeuralProcessor]),
                    source: NativeError::Unavailable {
                        kind: BackendKind::NeuralProcessor,
                        reason: "no HTP".into(),
                    },
                },
                DelegateInitError {
                    tier: Tier::baseline(),
                    source: NativeError::NullHandle("TfLiteInterpreterCreate"),
                },
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("tier [npu] failed: npu backend unavailable: no HTP"));
        assert!(msg.contains("tier [] failed: TfLiteInterpreterCreate returned null"));
    }

    #[test]
    fn test_exhausted_empty_order() {
        let err = InitError::ExhaustedFallback { attempts: vec![] };
        assert!(err.to_string().ends_with("priority order is empty"));
    }
}
