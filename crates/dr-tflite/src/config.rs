use std::path::{Path, PathBuf};

/// Library locations for the TensorFlow Lite runtime and its delegates.
///
/// Relative delegate paths are looked up in the platform's native library
/// directory; absolute paths are used as given. The runtime library itself
/// is opened as given, so a bare soname goes through the loader's search
/// path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TfLiteConfig {
    pub runtime_library: PathBuf,
    pub gpu_delegate_library: PathBuf,
    pub qnn_delegate_library: PathBuf,
}

impl Default for TfLiteConfig {
    fn default() -> Self {
        Self {
            runtime_library: PathBuf::from("libtensorflowlite_c.so"),
            gpu_delegate_library: PathBuf::from("libtensorflowlite_gpu_delegate.so"),
            qnn_delegate_library: PathBuf::from("libQnnTFLiteDelegate.so"),
        }
    }
}

/// Place a relative library path inside `native_dir`.
pub(crate) fn resolve_library(library: &Path, native_dir: &Path) -> PathBuf {
    if library.is_absolute() || native_dir.as_os_str().is_empty() {
        library.to_path_buf()
    } else {
        native_dir.join(library)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative() {
        let p = resolve_library(
            Path::new("libQnnTFLiteDelegate.so"),
            Path::new("/data/app/lib/arm64"),
        );
        assert_eq!(p, PathBuf::from("/data/app/lib/arm64/libQnnTFLiteDelegate.so"));
    }

    #[test]
    fn test_resolve_absolute_and_no_dir() {
        let abs = Path::new("/vendor/lib64/libQnnTFLiteDelegate.so");
        assert_eq!(resolve_library(abs, Path::new("/data/app/lib")), abs);
        assert_eq!(
            resolve_library(Path::new("libfoo.so"), Path::new("")),
            PathBuf::from("libfoo.so")
        );
    }
}
