//! Delegates for the TensorFlow Lite runtime and the factories that build
//! them.

use std::ffi::{c_char, CStr, CString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use tracing::{debug, warn};

use dr_delegate::{BackendKind, Delegate, DelegateContext, DelegateFactory, NativeError};

use crate::config::resolve_library;
use crate::ffi;
use crate::interpreter::thread_count;
use crate::library::{self, RuntimeLibrary};

/// Keeps the library that owns a delegate's code mapped.
enum Owner {
    Runtime(Arc<RuntimeLibrary>),
    Plugin(Library),
}

/// A delegate created through the TensorFlow Lite C API or a plugin.
pub struct TfLiteDelegate {
    kind: BackendKind,
    raw: *mut ffi::TfLiteDelegate,
    delete: ffi::FnDelegateDelete,
    // Option strings the delegate may keep pointers to until it is deleted.
    _strings: Vec<CString>,
    _owner: Owner,
}

// SAFETY: delegates are only touched from the thread that owns the session;
// moving them between threads is supported by every delegate we create.
unsafe impl Send for TfLiteDelegate {}

impl TfLiteDelegate {
    fn new(
        kind: BackendKind,
        raw: *mut ffi::TfLiteDelegate,
        delete: ffi::FnDelegateDelete,
        strings: Vec<CString>,
        owner: Owner,
    ) -> Self {
        TfLiteDelegate {
            kind,
            raw,
            delete,
            _strings: strings,
            _owner: owner,
        }
    }

    pub(crate) fn as_ptr(&self) -> *mut ffi::TfLiteDelegate {
        self.raw
    }
}

impl Delegate for TfLiteDelegate {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn release(&mut self) -> Result<(), NativeError> {
        if self.raw.is_null() {
            return Ok(());
        }
        unsafe { (self.delete)(self.raw) };
        self.raw = std::ptr::null_mut();
        debug!(backend = %self.kind, "delegate deleted");
        Ok(())
    }
}

impl Drop for TfLiteDelegate {
    fn drop(&mut self) {
        // No-op once a BackendHandle has released it.
        let _ = self.release();
    }
}

fn c_string(value: &str) -> Result<CString, NativeError> {
    CString::new(value)
        .map_err(|_| NativeError::InvalidArgument(format!("interior nul byte in {:?}", value)))
}

fn c_path(path: &Path) -> Result<CString, NativeError> {
    c_string(&path.to_string_lossy())
}

/// GPU delegate V2 from `libtensorflowlite_gpu_delegate.so`.
///
/// Precision loss is allowed, the sustained-speed preference is used, and
/// compiled kernels are serialized to the cache directory under the model
/// hash when a cache directory is configured.
pub struct GpuDelegateFactory {
    library: PathBuf,
}

impl GpuDelegateFactory {
    pub fn new(library: impl Into<PathBuf>) -> Self {
        GpuDelegateFactory {
            library: library.into(),
        }
    }
}

impl DelegateFactory<TfLiteDelegate> for GpuDelegateFactory {
    fn kind(&self) -> BackendKind {
        BackendKind::Gpu
    }

    fn create(&self, ctx: &DelegateContext<'_>) -> Result<TfLiteDelegate, NativeError> {
        let path = resolve_library(&self.library, &ctx.paths.native_library_dir);
        let lib = library::open(&path)?;
        let (options_default, create, delete) = unsafe {
            (
                library::symbol::<ffi::FnGpuOptionsDefault>(&lib, "TfLiteGpuDelegateOptionsV2Default")?,
                library::symbol::<ffi::FnGpuCreate>(&lib, "TfLiteGpuDelegateV2Create")?,
                library::symbol::<ffi::FnDelegateDelete>(&lib, "TfLiteGpuDelegateV2Delete")?,
            )
        };

        let mut strings = Vec::new();
        let mut options = unsafe { options_default() };
        options.is_precision_loss_allowed = 1;
        options.inference_preference = ffi::TFLITE_GPU_INFERENCE_PREFERENCE_SUSTAINED_SPEED;
        if !ctx.paths.cache_dir.as_os_str().is_empty() {
            let dir = c_path(&ctx.paths.cache_dir)?;
            let token = c_string(ctx.model.hash())?;
            options.experimental_flags |= ffi::TFLITE_GPU_EXPERIMENTAL_FLAGS_ENABLE_SERIALIZATION;
            options.serialization_dir = dir.as_ptr();
            options.model_token = token.as_ptr();
            strings.push(dir);
            strings.push(token);
        }

        let raw = unsafe { create(&options) };
        if raw.is_null() {
            return Err(NativeError::Unavailable {
                kind: BackendKind::Gpu,
                reason: "TfLiteGpuDelegateV2Create returned null".to_string(),
            });
        }
        Ok(TfLiteDelegate::new(
            BackendKind::Gpu,
            raw,
            delete,
            strings,
            Owner::Plugin(lib),
        ))
    }
}

/// Qualcomm QNN delegate, loaded through the external delegate plugin ABI.
///
/// Targets the HTP (Hexagon tensor processor) backend in burst mode with
/// FP16 precision. Compiled graphs are cached in the cache directory keyed
/// by the model hash.
pub struct QnnDelegateFactory {
    library: PathBuf,
}

impl QnnDelegateFactory {
    pub fn new(library: impl Into<PathBuf>) -> Self {
        QnnDelegateFactory {
            library: library.into(),
        }
    }
}

/// Key/value options passed to the QNN plugin.
pub(crate) fn qnn_options(ctx: &DelegateContext<'_>) -> Vec<(&'static str, String)> {
    let mut options = vec![
        ("backend_type", "htp".to_string()),
        // 2 = burst
        ("htp_performance_mode", "2".to_string()),
        // 1 = fp16
        ("htp_precision", "1".to_string()),
    ];
    if !ctx.paths.native_library_dir.as_os_str().is_empty() {
        options.push((
            "skel_library_dir",
            ctx.paths.native_library_dir.to_string_lossy().into_owned(),
        ));
    }
    if !ctx.paths.cache_dir.as_os_str().is_empty() {
        options.push(("cache_dir", ctx.paths.cache_dir.to_string_lossy().into_owned()));
        options.push(("model_token", ctx.model.hash().to_string()));
    }
    options
}

unsafe extern "C" fn report_plugin_error(message: *const c_char) {
    if message.is_null() {
        return;
    }
    let message = CStr::from_ptr(message).to_string_lossy();
    warn!(backend = "npu", "{}", message);
}

impl DelegateFactory<TfLiteDelegate> for QnnDelegateFactory {
    fn kind(&self) -> BackendKind {
        BackendKind::NeuralProcessor
    }

    fn create(&self, ctx: &DelegateContext<'_>) -> Result<TfLiteDelegate, NativeError> {
        let path = resolve_library(&self.library, &ctx.paths.native_library_dir);
        let lib = library::open(&path)?;
        let (create, delete) = unsafe {
            (
                library::symbol::<ffi::FnPluginCreate>(&lib, "tflite_plugin_create_delegate")?,
                library::symbol::<ffi::FnDelegateDelete>(&lib, "tflite_plugin_destroy_delegate")?,
            )
        };

        let mut keys = Vec::new();
        let mut values = Vec::new();
        for (key, value) in qnn_options(ctx) {
            keys.push(c_string(key)?);
            values.push(c_string(&value)?);
        }
        let mut key_ptrs: Vec<*mut c_char> = keys.iter().map(|k| k.as_ptr() as *mut c_char).collect();
        let mut value_ptrs: Vec<*mut c_char> =
            values.iter().map(|v| v.as_ptr() as *mut c_char).collect();

        let raw = unsafe {
            create(
                key_ptrs.as_mut_ptr(),
                value_ptrs.as_mut_ptr(),
                keys.len(),
                Some(report_plugin_error),
            )
        };
        if raw.is_null() {
            return Err(NativeError::Unavailable {
                kind: BackendKind::NeuralProcessor,
                reason: "QNN delegate could not open the HTP backend".to_string(),
            });
        }

        keys.append(&mut values);
        Ok(TfLiteDelegate::new(
            BackendKind::NeuralProcessor,
            raw,
            delete,
            keys,
            Owner::Plugin(lib),
        ))
    }
}

/// XNNPACK CPU delegate from the runtime library itself.
pub struct XnnpackDelegateFactory {
    runtime: Arc<RuntimeLibrary>,
}

impl XnnpackDelegateFactory {
    pub(crate) fn new(runtime: Arc<RuntimeLibrary>) -> Self {
        XnnpackDelegateFactory { runtime }
    }
}

impl DelegateFactory<TfLiteDelegate> for XnnpackDelegateFactory {
    fn kind(&self) -> BackendKind {
        BackendKind::CpuBaseline
    }

    fn create(&self, ctx: &DelegateContext<'_>) -> Result<TfLiteDelegate, NativeError> {
        let xnnpack = self
            .runtime
            .fns
            .xnnpack
            .ok_or_else(|| NativeError::Unavailable {
                kind: BackendKind::CpuBaseline,
                reason: "runtime library was built without XNNPACK".to_string(),
            })?;

        let mut options = unsafe { (xnnpack.options_default)() };
        options.num_threads = thread_count(ctx.num_threads);
        let raw = unsafe { (xnnpack.create)(&options) };
        if raw.is_null() {
            return Err(NativeError::Unavailable {
                kind: BackendKind::CpuBaseline,
                reason: "TfLiteXNNPackDelegateCreate returned null".to_string(),
            });
        }
        Ok(TfLiteDelegate::new(
            BackendKind::CpuBaseline,
            raw,
            xnnpack.delete,
            Vec::new(),
            Owner::Runtime(self.runtime.clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_delegate::{ModelHandle, PlatformPaths};

    fn paths() -> PlatformPaths {
        PlatformPaths {
            native_library_dir: PathBuf::from("/data/app/lib/arm64"),
            cache_dir: PathBuf::from("/data/user/0/app/cache"),
        }
    }

    #[test]
    fn test_qnn_options() {
        let model = ModelHandle::new(vec![1], "abc123").unwrap();
        let paths = paths();
        let ctx = DelegateContext {
            model: &model,
            paths: &paths,
            num_threads: 4,
        };
        let options = qnn_options(&ctx);
        let get = |k: &str| {
            options
                .iter()
                .find(|(key, _)| *key == k)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("backend_type"), Some("htp"));
        assert_eq!(get("skel_library_dir"), Some("/data/app/lib/arm64"));
        assert_eq!(get("cache_dir"), Some("/data/user/0/app/cache"));
        assert_eq!(get("model_token"), Some("abc123"));
    }

    #[test]
    fn test_qnn_options_without_cache() {
        let model = ModelHandle::new(vec![1], "abc123").unwrap();
        let paths = PlatformPaths::default();
        let ctx = DelegateContext {
            model: &model,
            paths: &paths,
            num_threads: 1,
        };
        let options = qnn_options(&ctx);
        assert!(options.iter().all(|(k, _)| *k != "cache_dir" && *k != "model_token"));
    }

    #[test]
    fn test_missing_plugin_is_reported() {
        let model = ModelHandle::new(vec![1], "abc123").unwrap();
        let dir = tempfile::tempdir().unwrap();
        let paths = PlatformPaths {
            native_library_dir: dir.path().to_path_buf(),
            cache_dir: dir.path().to_path_buf(),
        };
        let ctx = DelegateContext {
            model: &model,
            paths: &paths,
            num_threads: 1,
        };

        let gpu = GpuDelegateFactory::new("libtensorflowlite_gpu_delegate.so");
        assert!(matches!(
            gpu.create(&ctx),
            Err(NativeError::LibraryNotFound { .. })
        ));
        let qnn = QnnDelegateFactory::new("libQnnTFLiteDelegate.so");
        assert!(matches!(
            qnn.create(&ctx),
            Err(NativeError::LibraryNotFound { .. })
        ));
    }

    #[test]
    fn test_c_string_rejects_nul() {
        assert!(c_string("ok").is_ok());
        assert!(matches!(
            c_string("bad\0value"),
            Err(NativeError::InvalidArgument(_))
        ));
    }
}
