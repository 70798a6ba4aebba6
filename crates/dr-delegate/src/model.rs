use std::fmt;
use std::path::Path;
use std::sync::Arc;

use memmap2::Mmap;
use sha2::{Digest, Sha256};

use crate::error::InitError;

enum ModelBytes {
    Owned(Vec<u8>),
    Mapped(Mmap),
}

impl ModelBytes {
    fn as_slice(&self) -> &[u8] {
        match self {
            ModelBytes::Owned(v) => v.as_slice(),
            ModelBytes::Mapped(m) => &m[..],
        }
    }
}

/// Compiled model bytes plus the content hash backends key their
/// compilation caches on.
///
/// Cloning is cheap: the bytes are shared. Native runtimes keep a clone for
/// as long as anything built from the model is alive, since they read the
/// buffer in place.
#[derive(Clone)]
pub struct ModelHandle {
    bytes: Arc<ModelBytes>,
    hash: String,
}

impl ModelHandle {
    /// Wrap model bytes with a hash computed by the caller.
    ///
    /// # Errors
    /// Returns [`InitError::ModelLoad`] if `bytes` is empty.
    pub fn new(bytes: Vec<u8>, hash: impl Into<String>) -> Result<Self, InitError> {
        Self::from_parts(ModelBytes::Owned(bytes), hash.into())
    }

    /// Wrap model bytes, hashing them with [`content_hash`].
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, InitError> {
        let hash = content_hash(&bytes);
        Self::from_parts(ModelBytes::Owned(bytes), hash)
    }

    /// Memory-map a model file and hash its contents.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, InitError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        if file.metadata()?.len() == 0 {
            return Err(InitError::ModelLoad(format!(
                "{} is empty",
                path.display()
            )));
        }
        // SAFETY: the mapping is read-only; the file is expected to stay
        // unmodified while the model is in use.
        let mmap = unsafe { Mmap::map(&file)? };
        let hash = content_hash(&mmap);
        Self::from_parts(ModelBytes::Mapped(mmap), hash)
    }

    fn from_parts(bytes: ModelBytes, hash: String) -> Result<Self, InitError> {
        if bytes.as_slice().is_empty() {
            return Err(InitError::ModelLoad("model data is empty".to_string()));
        }
        Ok(ModelHandle {
            bytes: Arc::new(bytes),
            hash,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    /// Content hash, used as the model token for backend caches.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}

impl fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelHandle")
            .field("len", &self.len())
            .field("hash", &self.hash)
            .finish()
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
