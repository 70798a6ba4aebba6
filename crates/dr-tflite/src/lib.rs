//! `dr-tflite` - TensorFlow Lite runtime for `dr-delegate`.
//!
//! The TensorFlow Lite C library and the delegate libraries are opened at
//! runtime with `libloading`. Backends map to delegates as follows:
//! - `npu`: Qualcomm QNN delegate (HTP backend) via the external delegate
//!   plugin ABI
//! - `gpu`: GPU delegate V2
//! - `cpu`: XNNPACK, when the runtime library includes it
//!
//! The empty tier runs on the runtime's built-in kernels.

pub mod config;
pub mod delegate;
pub mod ffi;
pub mod interpreter;
mod library;

use std::sync::Arc;

use tracing::info;

use dr_delegate::{
    BackendKind, DelegateContext, DelegateFactory, DelegateRegistry, ModelHandle, NativeError,
    Runtime,
};

pub use config::TfLiteConfig;
pub use delegate::{GpuDelegateFactory, QnnDelegateFactory, TfLiteDelegate, XnnpackDelegateFactory};
pub use interpreter::{TfLiteInterpreter, TfLiteModel};

use library::RuntimeLibrary;

pub struct TfLiteRuntime {
    library: Arc<RuntimeLibrary>,
    registry: DelegateRegistry<TfLiteDelegate>,
}

impl TfLiteRuntime {
    /// Open the runtime library and register the default delegate factories.
    pub fn load(config: &TfLiteConfig) -> Result<Self, NativeError> {
        let library = Arc::new(RuntimeLibrary::load(&config.runtime_library)?);

        let mut registry = DelegateRegistry::new();
        registry.register(QnnDelegateFactory::new(config.qnn_delegate_library.clone()));
        registry.register(GpuDelegateFactory::new(config.gpu_delegate_library.clone()));
        if library.fns.xnnpack.is_some() {
            registry.register(XnnpackDelegateFactory::new(library.clone()));
        }

        info!(
            library = %config.runtime_library.display(),
            backends = ?registry.kinds(),
            "TensorFlow Lite runtime loaded"
        );
        Ok(TfLiteRuntime { library, registry })
    }

    /// Add or replace the factory for one backend kind.
    pub fn register(&mut self, factory: impl DelegateFactory<TfLiteDelegate> + 'static) {
        self.registry.register(factory);
    }

    pub fn supported_backends(&self) -> Vec<BackendKind> {
        self.registry.kinds()
    }
}

impl Runtime for TfLiteRuntime {
    type Model = TfLiteModel;
    type Delegate = TfLiteDelegate;
    type Interpreter = TfLiteInterpreter;

    fn name(&self) -> &str {
        "tflite"
    }

    fn load_model(&self, model: &ModelHandle) -> Result<TfLiteModel, NativeError> {
        TfLiteModel::load(&self.library, model)
    }

    fn create_delegate(
        &self,
        kind: BackendKind,
        ctx: &DelegateContext<'_>,
    ) -> Result<TfLiteDelegate, NativeError> {
        self.registry.create(kind, ctx)
    }

    fn create_interpreter(
        &self,
        model: &TfLiteModel,
        delegates: &[&TfLiteDelegate],
        num_threads: usize,
    ) -> Result<TfLiteInterpreter, NativeError> {
        TfLiteInterpreter::create(&self.library, model, delegates, num_threads)
    }
}
