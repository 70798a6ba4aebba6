use std::path::PathBuf;

use dr_tensor::{ElementType, QuantParams};

use crate::backend::BackendKind;
use crate::error::NativeError;
use crate::model::ModelHandle;

/// Platform locations supplied by the integration layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformPaths {
    /// Directory holding the application's native libraries (delegate
    /// plugins, NPU skeleton libraries).
    pub native_library_dir: PathBuf,
    /// Writable directory for backend compilation caches.
    pub cache_dir: PathBuf,
}

/// Everything a delegate factory may need to build a backend.
#[derive(Debug, Clone, Copy)]
pub struct DelegateContext<'a> {
    pub model: &'a ModelHandle,
    pub paths: &'a PlatformPaths,
    pub num_threads: usize,
}

/// Raw tensor metadata as reported by the native runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorInfo {
    pub name: String,
    pub dims: Vec<i32>,
    pub element_type: ElementType,
    /// Identifier of the tensor in the model graph.
    pub tensor_id: i32,
    pub byte_size: usize,
    /// Quantization exactly as reported, not yet normalized.
    pub quantization: QuantParams,
}

/// A live, initialized backend.
pub trait Delegate: Send {
    fn kind(&self) -> BackendKind;

    /// Free the native resources behind this delegate.
    ///
    /// Called exactly once, by [`BackendHandle`](crate::BackendHandle),
    /// after every interpreter using the delegate has been dropped.
    fn release(&mut self) -> Result<(), NativeError>;
}

/// An interpreter bound to a model and a set of delegates.
///
/// Dropping an interpreter frees it. It may reference memory owned by its
/// delegates, so it must be dropped before they are released.
pub trait Interpreter: Send {
    fn input_count(&self) -> usize;
    fn output_count(&self) -> usize;
    fn input_info(&self, index: usize) -> Result<TensorInfo, NativeError>;
    fn output_info(&self, index: usize) -> Result<TensorInfo, NativeError>;

    /// Copy `data` into input tensor `index`. The length must match the
    /// tensor's byte size.
    fn write_input(&mut self, index: usize, data: &[u8]) -> Result<(), NativeError>;

    /// Run one synchronous inference pass.
    fn invoke(&mut self) -> Result<(), NativeError>;

    /// Raw bytes of output tensor `index` from the last invoke.
    fn output_bytes(&self, index: usize) -> Result<&[u8], NativeError>;
}

/// A native inference runtime the delegate initializer can drive.
pub trait Runtime {
    type Model;
    type Delegate: Delegate;
    type Interpreter: Interpreter;

    /// Returns the name of this runtime (e.g. "tflite").
    fn name(&self) -> &str;

    /// Parse the model. Failure here is fatal for initialization.
    fn load_model(&self, model: &ModelHandle) -> Result<Self::Model, NativeError>;

    /// Construct one backend.
    fn create_delegate(
        &self,
        kind: BackendKind,
        ctx: &DelegateContext<'_>,
    ) -> Result<Self::Delegate, NativeError>;

    /// Build an interpreter that applies `delegates` in order and uses
    /// `num_threads` for the operations left on the CPU.
    fn create_interpreter(
        &self,
        model: &Self::Model,
        delegates: &[&Self::Delegate],
        num_threads: usize,
    ) -> Result<Self::Interpreter, NativeError>;
}
