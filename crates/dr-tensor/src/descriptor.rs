use crate::dtype::ElementType;
use crate::quant::QuantParams;
use crate::shape::Shape;

/// Metadata for one model input or output.
///
/// Built once when a session is created and never modified afterwards.
/// `buffer_index` is the position in the model's input or output list;
/// `tensor_id` is the runtime's identifier for the tensor in the whole
/// graph.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorDescriptor {
    name: String,
    shape: Shape,
    element_type: ElementType,
    buffer_index: usize,
    tensor_id: i32,
    quantization: Option<QuantParams>,
}

impl TensorDescriptor {
    pub fn new(
        name: impl Into<String>,
        shape: Shape,
        element_type: ElementType,
        buffer_index: usize,
        tensor_id: i32,
    ) -> Self {
        TensorDescriptor {
            name: name.into(),
            shape,
            element_type,
            buffer_index,
            tensor_id,
            quantization: None,
        }
    }

    /// Attach quantization parameters, normalizing absent ones to identity.
    pub fn with_quantization(mut self, params: QuantParams) -> Self {
        self.quantization = Some(params.normalized());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    pub fn buffer_index(&self) -> usize {
        self.buffer_index
    }

    pub fn tensor_id(&self) -> i32 {
        self.tensor_id
    }

    pub fn quantization(&self) -> Option<QuantParams> {
        self.quantization
    }

    /// Size of the tensor's buffer in bytes, if the element type is known.
    pub fn byte_size(&self) -> Option<usize> {
        self.element_type
            .size_in_bytes()
            .map(|s| s * self.shape.numel())
    }
}

/// A [`TensorDescriptor`] together with the `f32` data of the last predict.
///
/// `data` is empty until the first predict, and stays empty for element
/// types the marshaller cannot convert.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorResult {
    descriptor: TensorDescriptor,
    data: Vec<f32>,
}

impl TensorResult {
    pub fn new(descriptor: TensorDescriptor) -> Self {
        TensorResult {
            descriptor,
            data: Vec::new(),
        }
    }

    pub fn descriptor(&self) -> &TensorDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        self.descriptor.name()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable access to the data buffer, reused across predict calls.
    pub fn data_mut(&mut self) -> &mut Vec<f32> {
        &mut self.data
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}
