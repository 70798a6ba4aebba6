// Runtime library loading and symbol resolution.

use std::path::Path;

use libloading::Library;

use dr_delegate::NativeError;

use crate::ffi::*;

/// Open a shared library.
pub(crate) fn open(path: &Path) -> Result<Library, NativeError> {
    unsafe {
        Library::new(path).map_err(|e| NativeError::LibraryNotFound {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Resolve `name` and copy the function pointer out.
///
/// # Safety
/// `T` must match the symbol's real signature, and the pointer must not be
/// called after `lib` is unloaded.
pub(crate) unsafe fn symbol<T: Copy>(lib: &Library, name: &str) -> Result<T, NativeError> {
    lib.get::<T>(name.as_bytes())
        .map(|s| *s)
        .map_err(|_| NativeError::SymbolNotFound(name.to_string()))
}

/// XNNPACK entry points, present only in runtimes built with it.
#[derive(Clone, Copy)]
pub(crate) struct XnnpackFunctions {
    pub options_default: FnXnnpackOptionsDefault,
    pub create: FnXnnpackCreate,
    pub delete: FnDelegateDelete,
}

/// Function pointers resolved from the TensorFlow Lite C library.
pub(crate) struct RuntimeFunctions {
    pub model_create: FnModelCreate,
    pub model_delete: FnModelDelete,
    pub options_create: FnOptionsCreate,
    pub options_delete: FnOptionsDelete,
    pub options_set_num_threads: FnOptionsSetNumThreads,
    pub options_add_delegate: FnOptionsAddDelegate,
    pub interpreter_create: FnInterpreterCreate,
    pub interpreter_delete: FnInterpreterDelete,
    pub interpreter_input_count: FnInterpreterTensorCount,
    pub interpreter_output_count: FnInterpreterTensorCount,
    pub interpreter_input_tensor: FnInterpreterGetInputTensor,
    pub interpreter_output_tensor: FnInterpreterGetOutputTensor,
    pub interpreter_allocate_tensors: FnInterpreterAllocateTensors,
    pub interpreter_invoke: FnInterpreterInvoke,
    pub interpreter_input_indices: Option<FnInterpreterTensorIndices>,
    pub interpreter_output_indices: Option<FnInterpreterTensorIndices>,
    pub tensor_type: FnTensorType,
    pub tensor_num_dims: FnTensorNumDims,
    pub tensor_dim: FnTensorDim,
    pub tensor_byte_size: FnTensorByteSize,
    pub tensor_data: FnTensorData,
    pub tensor_name: FnTensorName,
    pub tensor_quantization_params: FnTensorQuantizationParams,
    pub tensor_copy_from_buffer: FnTensorCopyFromBuffer,
    pub xnnpack: Option<XnnpackFunctions>,
}

/// The loaded TensorFlow Lite C library.
///
/// Shared (behind an `Arc`) by every model, interpreter and XNNPACK
/// delegate created from it; `_lib` keeps the code mapped while any of
/// them is alive.
pub(crate) struct RuntimeLibrary {
    pub fns: RuntimeFunctions,
    _lib: Library,
}

impl RuntimeLibrary {
    pub fn load(path: &Path) -> Result<Self, NativeError> {
        let lib = open(path)?;

        let fns = unsafe {
            RuntimeFunctions {
                model_create: symbol(&lib, "TfLiteModelCreate")?,
                model_delete: symbol(&lib, "TfLiteModelDelete")?,
                options_create: symbol(&lib, "TfLiteInterpreterOptionsCreate")?,
                options_delete: symbol(&lib, "TfLiteInterpreterOptionsDelete")?,
                options_set_num_threads: symbol(&lib, "TfLiteInterpreterOptionsSetNumThreads")?,
                options_add_delegate: symbol(&lib, "TfLiteInterpreterOptionsAddDelegate")?,
                interpreter_create: symbol(&lib, "TfLiteInterpreterCreate")?,
                interpreter_delete: symbol(&lib, "TfLiteInterpreterDelete")?,
                interpreter_input_count: symbol(&lib, "TfLiteInterpreterGetInputTensorCount")?,
                interpreter_output_count: symbol(&lib, "TfLiteInterpreterGetOutputTensorCount")?,
                interpreter_input_tensor: symbol(&lib, "TfLiteInterpreterGetInputTensor")?,
                interpreter_output_tensor: symbol(&lib, "TfLiteInterpreterGetOutputTensor")?,
                interpreter_allocate_tensors: symbol(&lib, "TfLiteInterpreterAllocateTensors")?,
                interpreter_invoke: symbol(&lib, "TfLiteInterpreterInvoke")?,
                interpreter_input_indices: symbol(&lib, "TfLiteInterpreterInputTensorIndices").ok(),
                interpreter_output_indices: symbol(&lib, "TfLiteInterpreterOutputTensorIndices")
                    .ok(),
                tensor_type: symbol(&lib, "TfLiteTensorType")?,
                tensor_num_dims: symbol(&lib, "TfLiteTensorNumDims")?,
                tensor_dim: symbol(&lib, "TfLiteTensorDim")?,
                tensor_byte_size: symbol(&lib, "TfLiteTensorByteSize")?,
                tensor_data: symbol(&lib, "TfLiteTensorData")?,
                tensor_name: symbol(&lib, "TfLiteTensorName")?,
                tensor_quantization_params: symbol(&lib, "TfLiteTensorQuantizationParams")?,
                tensor_copy_from_buffer: symbol(&lib, "TfLiteTensorCopyFromBuffer")?,
                xnnpack: resolve_xnnpack(&lib),
            }
        };

        Ok(Self { fns, _lib: lib })
    }
}

unsafe fn resolve_xnnpack(lib: &Library) -> Option<XnnpackFunctions> {
    Some(XnnpackFunctions {
        options_default: symbol(lib, "TfLiteXNNPackDelegateOptionsDefault").ok()?,
        create: symbol(lib, "TfLiteXNNPackDelegateCreate").ok()?,
        delete: symbol(lib, "TfLiteXNNPackDelegateDelete").ok()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library() {
        let err = RuntimeLibrary::load(Path::new("/nonexistent/libtensorflowlite_c.so"))
            .err()
            .unwrap();
        match err {
            NativeError::LibraryNotFound { path, .. } => {
                assert_eq!(path, "/nonexistent/libtensorflowlite_c.so")
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_not_a_library() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            open(file.path()),
            Err(NativeError::LibraryNotFound { .. })
        ));
    }
}
