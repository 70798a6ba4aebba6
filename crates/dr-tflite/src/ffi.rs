//! Raw ABI of the TensorFlow Lite C API and the delegate libraries.
//!
//! Only the calls this crate makes are declared. Everything is resolved at
//! runtime through `libloading`, so the signatures below are function
//! pointer types rather than `extern` blocks.

use std::ffi::{c_char, c_int, c_void};

use dr_tensor::ElementType;

#[repr(C)]
pub struct TfLiteModel {
    _private: [u8; 0],
}

#[repr(C)]
pub struct TfLiteInterpreterOptions {
    _private: [u8; 0],
}

#[repr(C)]
pub struct TfLiteInterpreter {
    _private: [u8; 0],
}

#[repr(C)]
pub struct TfLiteTensor {
    _private: [u8; 0],
}

/// Opaque delegate; `TfLiteDelegate` / `TfLiteOpaqueDelegate` in the headers.
#[repr(C)]
pub struct TfLiteDelegate {
    _private: [u8; 0],
}

pub type TfLiteStatus = c_int;
pub const K_TFLITE_OK: TfLiteStatus = 0;

// TfLiteType
pub type TfLiteType = c_int;
pub const K_TFLITE_NO_TYPE: TfLiteType = 0;
pub const K_TFLITE_FLOAT32: TfLiteType = 1;
pub const K_TFLITE_INT32: TfLiteType = 2;
pub const K_TFLITE_UINT8: TfLiteType = 3;
pub const K_TFLITE_INT64: TfLiteType = 4;
pub const K_TFLITE_BOOL: TfLiteType = 6;
pub const K_TFLITE_INT16: TfLiteType = 7;
pub const K_TFLITE_INT8: TfLiteType = 9;
pub const K_TFLITE_FLOAT16: TfLiteType = 10;
pub const K_TFLITE_FLOAT64: TfLiteType = 11;

/// Map a `TfLiteType` code to an [`ElementType`].
pub fn element_type(code: TfLiteType) -> ElementType {
    match code {
        K_TFLITE_FLOAT32 => ElementType::Float32,
        K_TFLITE_INT32 => ElementType::Int32,
        K_TFLITE_UINT8 => ElementType::Uint8,
        K_TFLITE_INT64 => ElementType::Int64,
        K_TFLITE_BOOL => ElementType::Bool,
        K_TFLITE_INT16 => ElementType::Int16,
        K_TFLITE_INT8 => ElementType::Int8,
        K_TFLITE_FLOAT16 => ElementType::Float16,
        K_TFLITE_FLOAT64 => ElementType::Float64,
        other => ElementType::Unknown(other),
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TfLiteQuantizationParams {
    pub scale: f32,
    pub zero_point: i32,
}

// GPU delegate V2 (tensorflow/lite/delegates/gpu/delegate_options.h)
pub const TFLITE_GPU_INFERENCE_PREFERENCE_SUSTAINED_SPEED: i32 = 1;
pub const TFLITE_GPU_EXPERIMENTAL_FLAGS_ENABLE_SERIALIZATION: i64 = 1 << 3;

#[repr(C)]
pub struct TfLiteGpuDelegateOptionsV2 {
    pub is_precision_loss_allowed: i32,
    pub inference_preference: i32,
    pub inference_priority1: i32,
    pub inference_priority2: i32,
    pub inference_priority3: i32,
    pub experimental_flags: i64,
    pub max_delegated_partitions: i32,
    pub serialization_dir: *const c_char,
    pub model_token: *const c_char,
    /// Newer runtimes append fields; this keeps their defaults in bounds.
    pub _reserved: [u8; 256],
}

#[repr(C)]
pub struct TfLiteXNNPackDelegateOptions {
    pub num_threads: i32,
    pub flags: u32,
    pub weights_cache: *mut c_void,
    pub handle_variable_ops: bool,
    pub _reserved: [u8; 256],
}

// Core C API
pub type FnModelCreate = unsafe extern "C" fn(*const c_void, usize) -> *mut TfLiteModel;
pub type FnModelDelete = unsafe extern "C" fn(*mut TfLiteModel);

pub type FnOptionsCreate = unsafe extern "C" fn() -> *mut TfLiteInterpreterOptions;
pub type FnOptionsDelete = unsafe extern "C" fn(*mut TfLiteInterpreterOptions);
pub type FnOptionsSetNumThreads = unsafe extern "C" fn(*mut TfLiteInterpreterOptions, i32);
pub type FnOptionsAddDelegate =
    unsafe extern "C" fn(*mut TfLiteInterpreterOptions, *mut TfLiteDelegate);

pub type FnInterpreterCreate = unsafe extern "C" fn(
    *const TfLiteModel,
    *const TfLiteInterpreterOptions,
) -> *mut TfLiteInterpreter;
pub type FnInterpreterDelete = unsafe extern "C" fn(*mut TfLiteInterpreter);
pub type FnInterpreterTensorCount = unsafe extern "C" fn(*const TfLiteInterpreter) -> i32;
pub type FnInterpreterGetInputTensor =
    unsafe extern "C" fn(*const TfLiteInterpreter, i32) -> *mut TfLiteTensor;
pub type FnInterpreterGetOutputTensor =
    unsafe extern "C" fn(*const TfLiteInterpreter, i32) -> *const TfLiteTensor;
pub type FnInterpreterAllocateTensors =
    unsafe extern "C" fn(*mut TfLiteInterpreter) -> TfLiteStatus;
pub type FnInterpreterInvoke = unsafe extern "C" fn(*mut TfLiteInterpreter) -> TfLiteStatus;
/// `TfLiteInterpreterInputTensorIndices` / `...OutputTensorIndices`
/// (experimental API, absent from older runtimes).
pub type FnInterpreterTensorIndices =
    unsafe extern "C" fn(*const TfLiteInterpreter) -> *const c_int;

pub type FnTensorType = unsafe extern "C" fn(*const TfLiteTensor) -> TfLiteType;
pub type FnTensorNumDims = unsafe extern "C" fn(*const TfLiteTensor) -> i32;
pub type FnTensorDim = unsafe extern "C" fn(*const TfLiteTensor, i32) -> i32;
pub type FnTensorByteSize = unsafe extern "C" fn(*const TfLiteTensor) -> usize;
pub type FnTensorData = unsafe extern "C" fn(*const TfLiteTensor) -> *mut c_void;
pub type FnTensorName = unsafe extern "C" fn(*const TfLiteTensor) -> *const c_char;
pub type FnTensorQuantizationParams =
    unsafe extern "C" fn(*const TfLiteTensor) -> TfLiteQuantizationParams;
pub type FnTensorCopyFromBuffer =
    unsafe extern "C" fn(*mut TfLiteTensor, *const c_void, usize) -> TfLiteStatus;

// Delegates
pub type FnDelegateDelete = unsafe extern "C" fn(*mut TfLiteDelegate);

pub type FnGpuOptionsDefault = unsafe extern "C" fn() -> TfLiteGpuDelegateOptionsV2;
pub type FnGpuCreate =
    unsafe extern "C" fn(*const TfLiteGpuDelegateOptionsV2) -> *mut TfLiteDelegate;

pub type FnXnnpackOptionsDefault = unsafe extern "C" fn() -> TfLiteXNNPackDelegateOptions;
pub type FnXnnpackCreate =
    unsafe extern "C" fn(*const TfLiteXNNPackDelegateOptions) -> *mut TfLiteDelegate;

/// Error callback handed to external delegate plugins.
pub type PluginErrorReporter = Option<unsafe extern "C" fn(*const c_char)>;

/// `tflite_plugin_create_delegate`, the external delegate plugin entry point.
pub type FnPluginCreate = unsafe extern "C" fn(
    *mut *mut c_char,
    *mut *mut c_char,
    usize,
    PluginErrorReporter,
) -> *mut TfLiteDelegate;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_type_mapping() {
        assert_eq!(element_type(K_TFLITE_FLOAT32), ElementType::Float32);
        assert_eq!(element_type(K_TFLITE_UINT8), ElementType::Uint8);
        assert_eq!(element_type(K_TFLITE_INT8), ElementType::Int8);
        assert_eq!(element_type(K_TFLITE_FLOAT16), ElementType::Float16);
        assert_eq!(element_type(K_TFLITE_NO_TYPE), ElementType::Unknown(0));
        // kTfLiteString
        assert_eq!(element_type(5), ElementType::Unknown(5));
    }
}
