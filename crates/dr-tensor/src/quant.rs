/// Scale and zero-offset below this are treated as "no quantization".
pub const ABSENT_THRESHOLD: f32 = 1e-4;

/// Per-tensor affine quantization parameters.
///
/// ```text
/// f32_value = (raw - zero_point) * scale
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantParams {
    pub scale: f32,
    pub zero_point: f32,
}

impl QuantParams {
    /// The transform that leaves raw values unchanged.
    pub const IDENTITY: QuantParams = QuantParams {
        scale: 1.0,
        zero_point: 0.0,
    };

    pub fn new(scale: f32, zero_point: f32) -> Self {
        QuantParams { scale, zero_point }
    }

    /// Returns true if both parameters fall below [`ABSENT_THRESHOLD`].
    ///
    /// Runtimes report `scale = 0, zero_point = 0` for tensors that carry no
    /// quantization. The comparison is signed and must stay that way: the
    /// reference outputs were produced with it.
    pub fn is_absent(&self) -> bool {
        self.scale < ABSENT_THRESHOLD && self.zero_point < ABSENT_THRESHOLD
    }

    /// Replace absent parameters with [`QuantParams::IDENTITY`].
    ///
    /// Without this, dequantizing with the runtime's `0.0` scale would turn
    /// every output element into zero.
    pub fn normalized(self) -> Self {
        if self.is_absent() {
            QuantParams::IDENTITY
        } else {
            self
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == QuantParams::IDENTITY
    }
}

impl Default for QuantParams {
    fn default() -> Self {
        QuantParams::IDENTITY
    }
}
