use thiserror::Error;

use dr_delegate::{InitError, NativeError};
use dr_tensor::TensorError;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("initialization failed: {0}")]
    Init(#[from] InitError),
    #[error("session is closed")]
    Closed,
    #[error("model has {0} inputs, predict supports exactly one")]
    InputCount(usize),
    #[error("input is {got} bytes, the model expects {expected}")]
    InputSize { expected: usize, got: usize },
    #[error("inference failed: {0}")]
    Inference(#[source] NativeError),
    #[error("failed to read tensor metadata: {0}")]
    Metadata(#[source] NativeError),
    #[error("tensor error: {0}")]
    Tensor(#[from] TensorError),
}

pub type Result<T> = std::result::Result<T, SessionError>;
