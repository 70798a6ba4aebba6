//! Scripted in-process runtime for tests.
//!
//! [`MockRuntime`] records every model load, delegate creation and release,
//! and interpreter creation and drop in an [`EventLog`], and can be told
//! which backends are unavailable, which tiers fail at interpreter
//! construction, and which delegates fail to release.
//!
//! Its interpreter echoes the last input into every output buffer: byte `j`
//! of each output is byte `j % len` of the input.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use dr_tensor::{ElementType, QuantParams};

use crate::backend::BackendKind;
use crate::error::NativeError;
use crate::model::ModelHandle;
use crate::registry::{DelegateFactory, DelegateRegistry};
use crate::runtime::{Delegate, DelegateContext, Interpreter, Runtime, TensorInfo};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    ModelLoaded,
    DelegateCreated(BackendKind),
    DelegateReleased(BackendKind),
    InterpreterCreated(Vec<BackendKind>),
    InterpreterDropped,
    Invoked,
}

/// Shared, cloneable event record.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<MockEvent>>>);

impl EventLog {
    fn push(&self, event: MockEvent) {
        if let Ok(mut events) = self.0.lock() {
            events.push(event);
        }
    }

    pub fn events(&self) -> Vec<MockEvent> {
        self.0.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, event: &MockEvent) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn clear(&self) {
        if let Ok(mut events) = self.0.lock() {
            events.clear();
        }
    }
}

/// Tensor layout the mock interpreter reports.
#[derive(Debug, Clone)]
pub struct MockTensor {
    pub name: String,
    pub dims: Vec<i32>,
    pub element_type: ElementType,
    pub quantization: QuantParams,
}

impl MockTensor {
    pub fn new(name: &str, dims: &[i32], element_type: ElementType) -> Self {
        MockTensor {
            name: name.to_string(),
            dims: dims.to_vec(),
            element_type,
            quantization: QuantParams::new(0.0, 0.0),
        }
    }

    pub fn with_quantization(mut self, scale: f32, zero_point: f32) -> Self {
        self.quantization = QuantParams::new(scale, zero_point);
        self
    }

    fn byte_size(&self) -> usize {
        let n: usize = self.dims.iter().map(|&d| d.max(0) as usize).product();
        n * self.element_type.size_in_bytes().unwrap_or(1)
    }

    fn info(&self, tensor_id: i32) -> TensorInfo {
        TensorInfo {
            name: self.name.clone(),
            dims: self.dims.clone(),
            element_type: self.element_type,
            tensor_id,
            byte_size: self.byte_size(),
            quantization: self.quantization,
        }
    }
}

pub struct MockDelegate {
    kind: BackendKind,
    fail_release: bool,
    log: EventLog,
}

impl Delegate for MockDelegate {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn release(&mut self) -> Result<(), NativeError> {
        self.log.push(MockEvent::DelegateReleased(self.kind));
        if self.fail_release {
            return Err(NativeError::Status {
                call: "mock_delegate_delete",
                status: -1,
            });
        }
        Ok(())
    }
}

struct MockFactory {
    kind: BackendKind,
    available: bool,
    fail_release: bool,
    log: EventLog,
}

impl DelegateFactory<MockDelegate> for MockFactory {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn create(&self, _ctx: &DelegateContext<'_>) -> Result<MockDelegate, NativeError> {
        if !self.available {
            return Err(NativeError::Unavailable {
                kind: self.kind,
                reason: "not present on this device".to_string(),
            });
        }
        self.log.push(MockEvent::DelegateCreated(self.kind));
        Ok(MockDelegate {
            kind: self.kind,
            fail_release: self.fail_release,
            log: self.log.clone(),
        })
    }
}

pub struct MockModel {
    _model: ModelHandle,
}

pub struct MockRuntime {
    unavailable: HashSet<BackendKind>,
    failing_release: HashSet<BackendKind>,
    unregistered: HashSet<BackendKind>,
    rejected_tiers: Vec<Vec<BackendKind>>,
    reject_model: bool,
    invokes_before_failure: Option<usize>,
    inputs: Vec<MockTensor>,
    outputs: Vec<MockTensor>,
    registry: DelegateRegistry<MockDelegate>,
    log: EventLog,
}

impl MockRuntime {
    /// Every backend available; one `[1, 4]` uint8 input, one `[1, 4]`
    /// uint8 output.
    pub fn new() -> Self {
        let mut rt = MockRuntime {
            unavailable: HashSet::new(),
            failing_release: HashSet::new(),
            unregistered: HashSet::new(),
            rejected_tiers: Vec::new(),
            reject_model: false,
            invokes_before_failure: None,
            inputs: vec![MockTensor::new("input", &[1, 4], ElementType::Uint8)],
            outputs: vec![MockTensor::new("output", &[1, 4], ElementType::Uint8)],
            registry: DelegateRegistry::new(),
            log: EventLog::default(),
        };
        rt.rebuild_registry();
        rt
    }

    pub fn unavailable(mut self, kind: BackendKind) -> Self {
        self.unavailable.insert(kind);
        self.rebuild_registry();
        self
    }

    pub fn failing_release(mut self, kind: BackendKind) -> Self {
        self.failing_release.insert(kind);
        self.rebuild_registry();
        self
    }

    pub fn without_factory(mut self, kind: BackendKind) -> Self {
        self.unregistered.insert(kind);
        self.rebuild_registry();
        self
    }

    /// Fail interpreter construction for exactly this delegate set.
    pub fn reject_interpreter(mut self, kinds: &[BackendKind]) -> Self {
        self.rejected_tiers.push(kinds.to_vec());
        self
    }

    pub fn reject_model(mut self) -> Self {
        self.reject_model = true;
        self
    }

    pub fn failing_invoke(self) -> Self {
        self.failing_invoke_after(0)
    }

    /// Let `n` invokes succeed, then fail every later one.
    pub fn failing_invoke_after(mut self, n: usize) -> Self {
        self.invokes_before_failure = Some(n);
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<MockTensor>) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn with_outputs(mut self, outputs: Vec<MockTensor>) -> Self {
        self.outputs = outputs;
        self
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    fn rebuild_registry(&mut self) {
        let mut registry = DelegateRegistry::new();
        for kind in BackendKind::ALL {
            if self.unregistered.contains(&kind) {
                continue;
            }
            registry.register(MockFactory {
                kind,
                available: !self.unavailable.contains(&kind),
                fail_release: self.failing_release.contains(&kind),
                log: self.log.clone(),
            });
        }
        self.registry = registry;
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime for MockRuntime {
    type Model = MockModel;
    type Delegate = MockDelegate;
    type Interpreter = MockInterpreter;

    fn name(&self) -> &str {
        "mock"
    }

    fn load_model(&self, model: &ModelHandle) -> Result<MockModel, NativeError> {
        if self.reject_model {
            return Err(NativeError::NullHandle("mock_model_create"));
        }
        self.log.push(MockEvent::ModelLoaded);
        Ok(MockModel {
            _model: model.clone(),
        })
    }

    fn create_delegate(
        &self,
        kind: BackendKind,
        ctx: &DelegateContext<'_>,
    ) -> Result<MockDelegate, NativeError> {
        self.registry.create(kind, ctx)
    }

    fn create_interpreter(
        &self,
        _model: &MockModel,
        delegates: &[&MockDelegate],
        _num_threads: usize,
    ) -> Result<MockInterpreter, NativeError> {
        let kinds: Vec<BackendKind> = delegates.iter().map(|d| d.kind()).collect();
        if self.rejected_tiers.contains(&kinds) {
            return Err(NativeError::Status {
                call: "mock_interpreter_create",
                status: 1,
            });
        }
        self.log.push(MockEvent::InterpreterCreated(kinds));
        Ok(MockInterpreter {
            input_bufs: self.inputs.iter().map(|t| vec![0; t.byte_size()]).collect(),
            output_bufs: self.outputs.iter().map(|t| vec![0; t.byte_size()]).collect(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            invokes_left: self.invokes_before_failure,
            log: self.log.clone(),
        })
    }
}

pub struct MockInterpreter {
    inputs: Vec<MockTensor>,
    outputs: Vec<MockTensor>,
    input_bufs: Vec<Vec<u8>>,
    output_bufs: Vec<Vec<u8>>,
    invokes_left: Option<usize>,
    log: EventLog,
}

impl MockInterpreter {
    fn check(index: usize, count: usize) -> Result<(), NativeError> {
        if index >= count {
            return Err(NativeError::InvalidIndex { index, count });
        }
        Ok(())
    }
}

impl Interpreter for MockInterpreter {
    fn input_count(&self) -> usize {
        self.inputs.len()
    }

    fn output_count(&self) -> usize {
        self.outputs.len()
    }

    fn input_info(&self, index: usize) -> Result<TensorInfo, NativeError> {
        Self::check(index, self.inputs.len())?;
        Ok(self.inputs[index].info(index as i32))
    }

    fn output_info(&self, index: usize) -> Result<TensorInfo, NativeError> {
        Self::check(index, self.outputs.len())?;
        Ok(self.outputs[index].info((self.inputs.len() + index) as i32))
    }

    fn write_input(&mut self, index: usize, data: &[u8]) -> Result<(), NativeError> {
        Self::check(index, self.inputs.len())?;
        let buf = &mut self.input_bufs[index];
        if buf.len() != data.len() {
            return Err(NativeError::SizeMismatch {
                expected: buf.len(),
                got: data.len(),
            });
        }
        buf.copy_from_slice(data);
        Ok(())
    }

    fn invoke(&mut self) -> Result<(), NativeError> {
        match self.invokes_left {
            Some(0) => {
                return Err(NativeError::Status {
                    call: "mock_invoke",
                    status: 1,
                })
            }
            Some(n) => self.invokes_left = Some(n - 1),
            None => {}
        }
        self.log.push(MockEvent::Invoked);
        let input = self.input_bufs.first().cloned().unwrap_or_default();
        for out in &mut self.output_bufs {
            for (j, b) in out.iter_mut().enumerate() {
                *b = if input.is_empty() { 0 } else { input[j % input.len()] };
            }
        }
        Ok(())
    }

    fn output_bytes(&self, index: usize) -> Result<&[u8], NativeError> {
        Self::check(index, self.outputs.len())?;
        Ok(&self.output_bufs[index])
    }
}

impl Drop for MockInterpreter {
    fn drop(&mut self) {
        self.log.push(MockEvent::InterpreterDropped);
    }
}
