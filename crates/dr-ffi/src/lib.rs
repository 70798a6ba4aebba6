mod context;
mod error;
mod types;

pub use context::*;
pub use error::*;
pub use types::*;

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

use tracing::debug;

use dr_delegate::{InitOptions, ModelHandle, PlatformPaths, PriorityOrder};
use dr_session::{InferenceSession, SessionError};
use dr_tflite::{TfLiteConfig, TfLiteRuntime};

/// Execute a closure that returns a `DRStatus`, catching any panics
/// and converting them into `DRStatus::ErrorInternal`.
///
/// A session whose call panicked must not be used again; callers are told
/// so through the status code.
fn catch_panic<F: FnOnce() -> DRStatus>(f: F) -> DRStatus {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(status) => status,
        Err(_) => {
            set_last_error("internal panic".to_string());
            DRStatus::ErrorInternal
        }
    }
}

/// Read an optional C string argument. Null means "not given".
unsafe fn optional_str<'a>(name: &str, s: *const c_char) -> Result<Option<&'a str>, DRStatus> {
    if s.is_null() {
        return Ok(None);
    }
    match CStr::from_ptr(s).to_str() {
        Ok(v) => Ok(Some(v)),
        Err(e) => {
            set_last_error(format!("invalid {}: {}", name, e));
            Err(DRStatus::ErrorInvalidArgument)
        }
    }
}

type CreateArgs<'a> = (&'a str, Option<&'a str>, Option<&'a str>, Option<&'a str>);

unsafe fn create_args<'a>(
    model_path: *const c_char,
    native_lib_dir: *const c_char,
    cache_dir: *const c_char,
    runtime_lib: *const c_char,
) -> Result<CreateArgs<'a>, DRStatus> {
    let model_path = optional_str("model path", model_path)?.ok_or_else(|| {
        set_last_error("null argument".to_string());
        DRStatus::ErrorInvalidArgument
    })?;
    Ok((
        model_path,
        optional_str("native library dir", native_lib_dir)?,
        optional_str("cache dir", cache_dir)?,
        optional_str("runtime library", runtime_lib)?,
    ))
}

/// Create an inference session.
///
/// Opens the model at `model_path`, loads the TensorFlow Lite runtime from
/// `runtime_lib` (null for the default soname) and initializes it with the
/// first working backend tier of `preset`. `native_lib_dir` is where
/// delegate plugins are looked up and `cache_dir` where backends keep
/// compiled graphs; either may be null. `num_threads == 0` uses half the
/// available processors.
///
/// On success, writes a heap-allocated `DRSession` pointer into
/// `*session_out`. The caller must later call `dr_session_destroy`.
#[no_mangle]
pub unsafe extern "C" fn dr_session_create(
    model_path: *const c_char,
    preset: DRPriorityPreset,
    native_lib_dir: *const c_char,
    cache_dir: *const c_char,
    runtime_lib: *const c_char,
    num_threads: u32,
    session_out: *mut *mut DRSession,
) -> DRStatus {
    catch_panic(|| {
        if model_path.is_null() || session_out.is_null() {
            set_last_error("null argument".to_string());
            return DRStatus::ErrorInvalidArgument;
        }
        let args = unsafe { create_args(model_path, native_lib_dir, cache_dir, runtime_lib) };
        let (model_path, native_lib_dir, cache_dir, runtime_lib) = match args {
            Ok(a) => a,
            Err(status) => return status,
        };

        let model = match ModelHandle::open(model_path) {
            Ok(m) => m,
            Err(e) => return error::report(&SessionError::from(e)),
        };

        let mut config = TfLiteConfig::default();
        if let Some(lib) = runtime_lib {
            config.runtime_library = PathBuf::from(lib);
        }
        let runtime = match TfLiteRuntime::load(&config) {
            Ok(rt) => rt,
            Err(e) => {
                set_last_error(format!("failed to load runtime: {}", e));
                return DRStatus::ErrorInit;
            }
        };

        let options = InitOptions {
            num_threads: match num_threads {
                0 => default_num_threads(),
                n => n as usize,
            },
            paths: PlatformPaths {
                native_library_dir: native_lib_dir.map(PathBuf::from).unwrap_or_default(),
                cache_dir: cache_dir.map(PathBuf::from).unwrap_or_default(),
            },
        };
        debug!(
            model = model_path,
            preset = ?preset,
            num_threads = options.num_threads,
            "creating session"
        );

        let order = PriorityOrder::from(preset);
        match InferenceSession::new(&runtime, &model, &order, &options) {
            Ok(session) => {
                unsafe { *session_out = Box::into_raw(Box::new(DRSession::new(session))) };
                DRStatus::Ok
            }
            Err(e) => error::report(&e),
        }
    })
}

/// Destroy a session previously created by `dr_session_create`.
///
/// Releases the interpreter, then every backend. Passing a null pointer is a
/// no-op and returns `DRStatus::Ok`.
#[no_mangle]
pub unsafe extern "C" fn dr_session_destroy(session: *mut DRSession) -> DRStatus {
    if session.is_null() {
        return DRStatus::Ok;
    }
    drop(Box::from_raw(session));
    DRStatus::Ok
}

/// Run one inference pass on `input_len` bytes at `input`.
///
/// Results stay in the session until the next predict and are read with
/// `dr_session_output_data`.
#[no_mangle]
pub unsafe extern "C" fn dr_session_predict(
    session: *mut DRSession,
    input: *const u8,
    input_len: usize,
) -> DRStatus {
    catch_panic(|| {
        if session.is_null() || (input.is_null() && input_len > 0) {
            set_last_error("null argument".to_string());
            return DRStatus::ErrorInvalidArgument;
        }
        let session = unsafe { &mut *session };
        let input: &[u8] = if input_len == 0 {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(input, input_len) }
        };
        match session.session.predict(input) {
            Ok(_) => DRStatus::Ok,
            Err(e) => error::report(&e),
        }
    })
}

/// Write the number of model outputs into `*count_out`.
#[no_mangle]
pub unsafe extern "C" fn dr_session_output_count(
    session: *const DRSession,
    count_out: *mut usize,
) -> DRStatus {
    if session.is_null() || count_out.is_null() {
        set_last_error("null argument".to_string());
        return DRStatus::ErrorInvalidArgument;
    }
    *count_out = (*session).session.results().len();
    DRStatus::Ok
}

/// Borrow the `f32` data of output `index` from the last predict.
///
/// The pointer stays valid until the next `dr_session_predict` or
/// `dr_session_destroy`. Outputs whose element type cannot be converted
/// report a length of zero.
#[no_mangle]
pub unsafe extern "C" fn dr_session_output_data(
    session: *const DRSession,
    index: usize,
    data_out: *mut *const f32,
    len_out: *mut usize,
) -> DRStatus {
    if session.is_null() || data_out.is_null() || len_out.is_null() {
        set_last_error("null argument".to_string());
        return DRStatus::ErrorInvalidArgument;
    }
    let results = (*session).session.results();
    match results.get(index) {
        Some(result) => {
            *data_out = result.data().as_ptr();
            *len_out = result.data().len();
            DRStatus::Ok
        }
        None => {
            set_last_error(format!(
                "output index {} out of range (have {})",
                index,
                results.len()
            ));
            DRStatus::ErrorInvalidArgument
        }
    }
}

/// Write the duration of the last inference, in milliseconds, into
/// `*ms_out`. Writes -1 if no inference has run yet.
#[no_mangle]
pub unsafe extern "C" fn dr_session_last_inference_ms(
    session: *const DRSession,
    ms_out: *mut f64,
) -> DRStatus {
    if session.is_null() || ms_out.is_null() {
        set_last_error("null argument".to_string());
        return DRStatus::ErrorInvalidArgument;
    }
    *ms_out = match (*session).session.last_inference_time() {
        Some(d) => d.as_secs_f64() * 1000.0,
        None => -1.0,
    };
    DRStatus::Ok
}

/// Describe the backend tier the session runs on, e.g. `"[npu, gpu]"`.
///
/// The caller must free the returned string with `dr_free_string`.
#[no_mangle]
pub unsafe extern "C" fn dr_session_active_backends(
    session: *const DRSession,
    out: *mut *mut c_char,
) -> DRStatus {
    if session.is_null() || out.is_null() {
        set_last_error("null argument".to_string());
        return DRStatus::ErrorInvalidArgument;
    }
    let tier = (*session).session.active_backends().to_string();
    match CString::new(tier) {
        Ok(c) => {
            *out = c.into_raw();
            DRStatus::Ok
        }
        Err(e) => {
            set_last_error(format!("output encoding error: {}", e));
            DRStatus::ErrorInternal
        }
    }
}

/// Retrieve the last error message.
///
/// Returns a pointer to a C string describing the most recent error, or
/// null if no error has occurred. The caller must free the returned string
/// with `dr_free_string`.
#[no_mangle]
pub extern "C" fn dr_last_error() -> *const c_char {
    match error::take_last_error() {
        Some(e) => e.into_raw(),
        None => std::ptr::null(),
    }
}

/// Free a string previously returned by this library.
#[no_mangle]
pub unsafe extern "C" fn dr_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}
