use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use dr_delegate::{
    BackendHandles, DelegateInitializer, InitOptions, Initialized, Interpreter, ModelHandle,
    PriorityOrder, Runtime, TensorInfo, Tier,
};
use dr_tensor::{materialize, Shape, TensorDescriptor, TensorResult};

use crate::error::{Result, SessionError};

/// Native state of an open session.
///
/// Field order is drop order: the interpreter goes first.
struct Live<R: Runtime> {
    interpreter: R::Interpreter,
    backends: BackendHandles<R::Delegate>,
}

/// A model bound to one delegate tier, ready to run inference.
///
/// Outputs are written into [`TensorResult`]s owned by the session and
/// reused on every [`predict`](Self::predict).
pub struct InferenceSession<R: Runtime> {
    live: Option<Live<R>>,
    inputs: Vec<TensorDescriptor>,
    input_sizes: Vec<usize>,
    outputs: Vec<TensorDescriptor>,
    results: Vec<TensorResult>,
    tier: Tier,
    model_hash: String,
    last_inference: Option<Duration>,
}

impl<R: Runtime> InferenceSession<R> {
    /// Initialize `model` with the first working tier of `order`.
    pub fn new(
        runtime: &R,
        model: &ModelHandle,
        order: &PriorityOrder,
        options: &InitOptions,
    ) -> Result<Self> {
        let init = DelegateInitializer::new(runtime).initialize(model, order, options)?;
        Self::from_initialized(init, model.hash())
    }

    /// Wrap an already initialized interpreter and read its tensor metadata.
    pub fn from_initialized(init: Initialized<R>, model_hash: impl Into<String>) -> Result<Self> {
        let live: Live<R> = Live {
            interpreter: init.interpreter,
            backends: init.backends,
        };

        let mut inputs = Vec::new();
        let mut input_sizes = Vec::new();
        for i in 0..live.interpreter.input_count() {
            let info = live.interpreter.input_info(i).map_err(SessionError::Metadata)?;
            input_sizes.push(info.byte_size);
            inputs.push(descriptor(&info, i)?);
        }

        let mut outputs = Vec::new();
        for i in 0..live.interpreter.output_count() {
            let info = live.interpreter.output_info(i).map_err(SessionError::Metadata)?;
            let desc = descriptor(&info, i)?.with_quantization(info.quantization);
            if !desc.element_type().is_convertible() {
                warn!(
                    output = desc.name(),
                    element_type = %desc.element_type(),
                    "output type cannot be converted to f32; its data will stay empty"
                );
            }
            outputs.push(desc);
        }

        let results = outputs.iter().cloned().map(TensorResult::new).collect();
        let model_hash = model_hash.into();
        info!(
            tier = %init.tier,
            inputs = inputs.len(),
            outputs = outputs.len(),
            model = %model_hash,
            "inference session ready"
        );

        Ok(InferenceSession {
            live: Some(live),
            inputs,
            input_sizes,
            outputs,
            results,
            tier: init.tier,
            model_hash,
            last_inference: None,
        })
    }

    pub fn input_details(&self) -> &[TensorDescriptor] {
        &self.inputs
    }

    /// Output descriptors, with normalized quantization parameters.
    pub fn output_details(&self) -> &[TensorDescriptor] {
        &self.outputs
    }

    /// Run one inference pass on `input`, the raw bytes of the model's only
    /// input tensor.
    ///
    /// Float outputs are passed through (float16 widened), 8-bit outputs are
    /// dequantized, and outputs of any other type are left empty. Every
    /// result is emptied before the pass, so a failed predict never leaves
    /// data from an earlier one behind.
    ///
    /// # Errors
    /// - [`SessionError::Closed`] after [`close`](Self::close).
    /// - [`SessionError::InputCount`] if the model does not have exactly one
    ///   input.
    /// - [`SessionError::InputSize`] if `input` does not match the input
    ///   tensor's byte size.
    /// - [`SessionError::Inference`] if the runtime fails.
    pub fn predict(&mut self, input: &[u8]) -> Result<&[TensorResult]> {
        let live = self.live.as_mut().ok_or(SessionError::Closed)?;
        clear_all(&mut self.results);
        if self.inputs.len() != 1 {
            return Err(SessionError::InputCount(self.inputs.len()));
        }
        let expected = self.input_sizes[0];
        if input.len() != expected {
            return Err(SessionError::InputSize {
                expected,
                got: input.len(),
            });
        }

        live.interpreter
            .write_input(0, input)
            .map_err(SessionError::Inference)?;

        let start = Instant::now();
        live.interpreter.invoke().map_err(SessionError::Inference)?;
        let elapsed = start.elapsed();
        self.last_inference = Some(elapsed);
        debug!(
            elapsed_ms = elapsed.as_secs_f64() * 1000.0,
            tier = %self.tier,
            "inference complete"
        );

        if let Err(e) = read_outputs(&live.interpreter, &mut self.results) {
            clear_all(&mut self.results);
            return Err(e);
        }
        Ok(&self.results)
    }

    /// Results of the last predict; empty data before the first one.
    pub fn results(&self) -> &[TensorResult] {
        &self.results
    }

    /// Release the interpreter, then every backend handle.
    ///
    /// Release failures are logged and do not stop the remaining releases.
    /// Calling `close` again does nothing.
    pub fn close(&mut self) {
        let Some(live) = self.live.take() else {
            return;
        };
        let Live {
            interpreter,
            backends,
        } = live;
        drop(interpreter);
        let failures = backends.release_all();
        clear_all(&mut self.results);
        debug!(
            tier = %self.tier,
            release_failures = failures.len(),
            "inference session closed"
        );
    }

    pub fn is_closed(&self) -> bool {
        self.live.is_none()
    }

    /// Wall time of the last successful invoke.
    pub fn last_inference_time(&self) -> Option<Duration> {
        self.last_inference
    }

    /// The tier initialization settled on.
    pub fn active_backends(&self) -> &Tier {
        &self.tier
    }

    pub fn model_hash(&self) -> &str {
        &self.model_hash
    }
}

impl<R: Runtime> Drop for InferenceSession<R> {
    fn drop(&mut self) {
        self.close();
    }
}

fn clear_all(results: &mut [TensorResult]) {
    for result in results {
        result.clear();
    }
}

/// Convert every output of the last invoke into its result.
fn read_outputs<I: Interpreter>(interpreter: &I, results: &mut [TensorResult]) -> Result<()> {
    for (i, result) in results.iter_mut().enumerate() {
        let element_type = result.descriptor().element_type();
        if !element_type.is_convertible() {
            continue;
        }
        let params = result.descriptor().quantization().unwrap_or_default();
        let raw = interpreter.output_bytes(i).map_err(SessionError::Inference)?;
        materialize(element_type, raw, params, result.data_mut())?;
    }
    Ok(())
}

fn descriptor(info: &TensorInfo, index: usize) -> Result<TensorDescriptor> {
    let shape = Shape::from_native(&info.dims)?;
    Ok(TensorDescriptor::new(
        info.name.clone(),
        shape,
        info.element_type,
        index,
        info.tensor_id,
    ))
}
