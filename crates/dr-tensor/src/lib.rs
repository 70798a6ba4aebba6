//! `dr-tensor` - Tensor metadata and output marshalling for delegate-runtime.
//!
//! This crate provides:
//! - `ElementType` covering the native runtime's tensor element types
//! - `Shape` with validated, positive dimension sizes
//! - `QuantParams` with the absent-quantization normalization rule
//! - `TensorDescriptor` / `TensorResult` records handed to callers
//! - The `marshal` module converting raw output buffers into `f32`

pub mod descriptor;
pub mod dtype;
pub mod error;
pub mod marshal;
pub mod quant;
pub mod shape;

// Re-export primary types at the crate root for convenience.
pub use descriptor::{TensorDescriptor, TensorResult};
pub use dtype::ElementType;
pub use error::{Result, TensorError};
pub use marshal::{dequantize, dequantize_into, materialize, quantize};
pub use quant::QuantParams;
pub use shape::Shape;
