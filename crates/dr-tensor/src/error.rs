use thiserror::Error;

use crate::dtype::ElementType;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("element type {0} cannot be converted to f32")]
    NotConvertible(ElementType),
    #[error("buffer of {len} bytes is not a multiple of the {elem_size}-byte element size")]
    Misaligned { len: usize, elem_size: usize },
    #[error("invalid dimension {dim} at axis {axis}: dimensions must be positive")]
    InvalidDimension { axis: usize, dim: i64 },
}

pub type Result<T> = std::result::Result<T, TensorError>;
