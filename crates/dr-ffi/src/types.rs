use dr_delegate::PriorityOrder;

/// Status codes returned by all FFI functions.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DRStatus {
    Ok = 0,
    ErrorInvalidArgument = 1,
    ErrorModelLoad = 2,
    ErrorInit = 3,
    ErrorInference = 4,
    ErrorClosed = 5,
    ErrorInternal = 6,
}

/// Which backends a session may try, most capable first.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DRPriorityPreset {
    /// NPU together with GPU, then GPU alone, then CPU.
    Accelerated = 0,
    /// GPU, then CPU.
    GpuOnly = 1,
    /// CPU only.
    CpuOnly = 2,
}

impl From<DRPriorityPreset> for PriorityOrder {
    fn from(preset: DRPriorityPreset) -> Self {
        match preset {
            DRPriorityPreset::Accelerated => PriorityOrder::accelerated_default(),
            DRPriorityPreset::GpuOnly => PriorityOrder::gpu_only(),
            DRPriorityPreset::CpuOnly => PriorityOrder::cpu_only(),
        }
    }
}
