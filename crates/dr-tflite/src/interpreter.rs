use std::ffi::CStr;
use std::sync::Arc;

use dr_delegate::{Interpreter, ModelHandle, NativeError, TensorInfo};
use dr_tensor::QuantParams;

use crate::delegate::TfLiteDelegate;
use crate::ffi;
use crate::library::RuntimeLibrary;

struct ModelInner {
    raw: *mut ffi::TfLiteModel,
    lib: Arc<RuntimeLibrary>,
    // TfLiteModelCreate reads the buffer in place.
    _bytes: ModelHandle,
}

// SAFETY: a TfLiteModel is immutable after creation and may be shared by
// interpreters on any thread.
unsafe impl Send for ModelInner {}
unsafe impl Sync for ModelInner {}

impl Drop for ModelInner {
    fn drop(&mut self) {
        unsafe { (self.lib.fns.model_delete)(self.raw) };
    }
}

/// A parsed model. Interpreters built from it keep it alive.
pub struct TfLiteModel {
    inner: Arc<ModelInner>,
}

impl TfLiteModel {
    pub(crate) fn load(lib: &Arc<RuntimeLibrary>, model: &ModelHandle) -> Result<Self, NativeError> {
        let bytes = model.bytes();
        let raw = unsafe { (lib.fns.model_create)(bytes.as_ptr().cast(), bytes.len()) };
        if raw.is_null() {
            return Err(NativeError::NullHandle("TfLiteModelCreate"));
        }
        Ok(TfLiteModel {
            inner: Arc::new(ModelInner {
                raw,
                lib: lib.clone(),
                _bytes: model.clone(),
            }),
        })
    }
}

/// Deletes interpreter options once the interpreter has copied them.
struct OptionsGuard<'a> {
    raw: *mut ffi::TfLiteInterpreterOptions,
    lib: &'a RuntimeLibrary,
}

impl Drop for OptionsGuard<'_> {
    fn drop(&mut self) {
        unsafe { (self.lib.fns.options_delete)(self.raw) };
    }
}

/// Thread count as the C API takes it: at least one, saturating at `i32::MAX`.
pub(crate) fn thread_count(n: usize) -> i32 {
    i32::try_from(n.max(1)).unwrap_or(i32::MAX)
}

fn check(call: &'static str, status: ffi::TfLiteStatus) -> Result<(), NativeError> {
    if status != ffi::K_TFLITE_OK {
        return Err(NativeError::Status { call, status });
    }
    Ok(())
}

/// A TensorFlow Lite interpreter with its tensors allocated.
pub struct TfLiteInterpreter {
    raw: *mut ffi::TfLiteInterpreter,
    lib: Arc<RuntimeLibrary>,
    input_ids: Vec<i32>,
    output_ids: Vec<i32>,
    _model: Arc<ModelInner>,
}

// SAFETY: the interpreter is used from one thread at a time (`&mut self` for
// every mutating call) and TensorFlow Lite does not bind it to the thread
// that created it.
unsafe impl Send for TfLiteInterpreter {}

impl TfLiteInterpreter {
    pub(crate) fn create(
        lib: &Arc<RuntimeLibrary>,
        model: &TfLiteModel,
        delegates: &[&TfLiteDelegate],
        num_threads: usize,
    ) -> Result<Self, NativeError> {
        let fns = &lib.fns;
        let options = unsafe { (fns.options_create)() };
        if options.is_null() {
            return Err(NativeError::NullHandle("TfLiteInterpreterOptionsCreate"));
        }
        let options = OptionsGuard { raw: options, lib };

        unsafe {
            (fns.options_set_num_threads)(options.raw, thread_count(num_threads));
            for delegate in delegates {
                (fns.options_add_delegate)(options.raw, delegate.as_ptr());
            }
        }

        let raw = unsafe { (fns.interpreter_create)(model.inner.raw, options.raw) };
        if raw.is_null() {
            return Err(NativeError::NullHandle("TfLiteInterpreterCreate"));
        }

        let mut interpreter = TfLiteInterpreter {
            raw,
            lib: lib.clone(),
            input_ids: Vec::new(),
            output_ids: Vec::new(),
            _model: model.inner.clone(),
        };
        check("TfLiteInterpreterAllocateTensors", unsafe {
            (fns.interpreter_allocate_tensors)(raw)
        })?;

        interpreter.input_ids =
            interpreter.tensor_ids(fns.interpreter_input_indices, interpreter.input_count());
        interpreter.output_ids =
            interpreter.tensor_ids(fns.interpreter_output_indices, interpreter.output_count());
        Ok(interpreter)
    }

    /// Graph tensor ids, or -1 each when the runtime cannot report them.
    fn tensor_ids(&self, indices: Option<ffi::FnInterpreterTensorIndices>, count: usize) -> Vec<i32> {
        let ptr = match indices {
            Some(f) => unsafe { f(self.raw) },
            None => std::ptr::null(),
        };
        if ptr.is_null() {
            return vec![-1; count];
        }
        unsafe { std::slice::from_raw_parts(ptr, count) }.to_vec()
    }

    fn input_tensor(&self, index: usize) -> Result<*mut ffi::TfLiteTensor, NativeError> {
        let count = self.input_count();
        if index >= count {
            return Err(NativeError::InvalidIndex { index, count });
        }
        let t = unsafe { (self.lib.fns.interpreter_input_tensor)(self.raw, index as i32) };
        if t.is_null() {
            return Err(NativeError::NullHandle("TfLiteInterpreterGetInputTensor"));
        }
        Ok(t)
    }

    fn output_tensor(&self, index: usize) -> Result<*const ffi::TfLiteTensor, NativeError> {
        let count = self.output_count();
        if index >= count {
            return Err(NativeError::InvalidIndex { index, count });
        }
        let t = unsafe { (self.lib.fns.interpreter_output_tensor)(self.raw, index as i32) };
        if t.is_null() {
            return Err(NativeError::NullHandle("TfLiteInterpreterGetOutputTensor"));
        }
        Ok(t)
    }

    fn info(&self, tensor: *const ffi::TfLiteTensor, tensor_id: i32) -> TensorInfo {
        let fns = &self.lib.fns;
        unsafe {
            let name_ptr = (fns.tensor_name)(tensor);
            let name = if name_ptr.is_null() {
                String::new()
            } else {
                CStr::from_ptr(name_ptr).to_string_lossy().into_owned()
            };
            let ndims = (fns.tensor_num_dims)(tensor).max(0);
            let dims = (0..ndims).map(|i| (fns.tensor_dim)(tensor, i)).collect();
            let q = (fns.tensor_quantization_params)(tensor);
            TensorInfo {
                name,
                dims,
                element_type: ffi::element_type((fns.tensor_type)(tensor)),
                tensor_id,
                byte_size: (fns.tensor_byte_size)(tensor),
                quantization: QuantParams::new(q.scale, q.zero_point as f32),
            }
        }
    }
}

impl Interpreter for TfLiteInterpreter {
    fn input_count(&self) -> usize {
        unsafe { (self.lib.fns.interpreter_input_count)(self.raw) }.max(0) as usize
    }

    fn output_count(&self) -> usize {
        unsafe { (self.lib.fns.interpreter_output_count)(self.raw) }.max(0) as usize
    }

    fn input_info(&self, index: usize) -> Result<TensorInfo, NativeError> {
        let tensor = self.input_tensor(index)?;
        let id = self.input_ids.get(index).copied().unwrap_or(-1);
        Ok(self.info(tensor, id))
    }

    fn output_info(&self, index: usize) -> Result<TensorInfo, NativeError> {
        let tensor = self.output_tensor(index)?;
        let id = self.output_ids.get(index).copied().unwrap_or(-1);
        Ok(self.info(tensor, id))
    }

    fn write_input(&mut self, index: usize, data: &[u8]) -> Result<(), NativeError> {
        let tensor = self.input_tensor(index)?;
        let expected = unsafe { (self.lib.fns.tensor_byte_size)(tensor) };
        if data.len() != expected {
            return Err(NativeError::SizeMismatch {
                expected,
                got: data.len(),
            });
        }
        check("TfLiteTensorCopyFromBuffer", unsafe {
            (self.lib.fns.tensor_copy_from_buffer)(tensor, data.as_ptr().cast(), data.len())
        })
    }

    fn invoke(&mut self) -> Result<(), NativeError> {
        check("TfLiteInterpreterInvoke", unsafe {
            (self.lib.fns.interpreter_invoke)(self.raw)
        })
    }

    fn output_bytes(&self, index: usize) -> Result<&[u8], NativeError> {
        let tensor = self.output_tensor(index)?;
        let (data, len) = unsafe {
            (
                (self.lib.fns.tensor_data)(tensor),
                (self.lib.fns.tensor_byte_size)(tensor),
            )
        };
        if len == 0 {
            return Ok(&[]);
        }
        if data.is_null() {
            return Err(NativeError::NullHandle("TfLiteTensorData"));
        }
        // SAFETY: the tensor buffer lives as long as the interpreter and is
        // only rewritten by invoke, which needs `&mut self`.
        Ok(unsafe { std::slice::from_raw_parts(data as *const u8, len) })
    }
}

impl Drop for TfLiteInterpreter {
    fn drop(&mut self) {
        unsafe { (self.lib.fns.interpreter_delete)(self.raw) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_count_saturates() {
        assert_eq!(thread_count(0), 1);
        assert_eq!(thread_count(4), 4);
        assert_eq!(thread_count(i32::MAX as usize), i32::MAX);
        assert_eq!(thread_count(usize::MAX), i32::MAX);
    }
}
