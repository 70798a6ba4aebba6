//! `dr-delegate` - Backend catalog and cascading delegate initialization.
//!
//! This crate provides:
//! - `BackendKind`, `Tier` and `PriorityOrder`, the catalog of hardware
//!   backends and the order they are tried in
//! - The `Runtime` / `Delegate` / `Interpreter` traits a native inference
//!   runtime implements
//! - `DelegateRegistry`, mapping backend kinds to the factories that build them
//! - `ModelHandle`, compiled model bytes plus their content hash
//! - `DelegateInitializer`, which walks a priority order until one tier
//!   yields a working interpreter

pub mod backend;
pub mod error;
pub mod handle;
pub mod initializer;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod model;
pub mod registry;
pub mod runtime;

pub use backend::{BackendKind, PriorityOrder, Tier};
pub use error::{DelegateInitError, InitError, NativeError};
pub use handle::{BackendHandle, BackendHandles};
pub use initializer::{DelegateInitializer, InitOptions, Initialized};
pub use model::ModelHandle;
pub use registry::{DelegateFactory, DelegateRegistry};
pub use runtime::{Delegate, DelegateContext, Interpreter, PlatformPaths, Runtime, TensorInfo};
