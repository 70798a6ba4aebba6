use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::NativeError;

/// A hardware acceleration family an interpreter can delegate work to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendKind {
    /// Neural processing unit (e.g. a Hexagon HTP through QNN).
    NeuralProcessor,
    /// Mobile GPU.
    Gpu,
    /// Optimized CPU kernels (XNNPACK).
    CpuBaseline,
}

impl BackendKind {
    pub const ALL: [BackendKind; 3] = [
        BackendKind::NeuralProcessor,
        BackendKind::Gpu,
        BackendKind::CpuBaseline,
    ];

    /// Short stable name, used in logs and when parsing.
    pub fn name(&self) -> &'static str {
        match self {
            BackendKind::NeuralProcessor => "npu",
            BackendKind::Gpu => "gpu",
            BackendKind::CpuBaseline => "cpu",
        }
    }

    /// Backends enabled unless a caller restricts them.
    pub fn default_enabled() -> HashSet<BackendKind> {
        [BackendKind::NeuralProcessor, BackendKind::Gpu]
            .into_iter()
            .collect()
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BackendKind {
    type Err = NativeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| NativeError::InvalidArgument(format!("unknown backend kind: {}", s)))
    }
}

/// A set of backends that must all initialize for any of them to be used.
///
/// Kinds keep their declaration order, which is the order delegates are
/// applied to the interpreter: earlier ones claim the graph nodes they
/// support first. That order is part of a tier's identity, so `[npu, gpu]`
/// and `[gpu, npu]` compare unequal; use [`same_backends`](Self::same_backends)
/// to compare the backend sets alone. The empty tier is the CPU-only
/// baseline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Tier {
    kinds: Vec<BackendKind>,
}

impl Tier {
    /// Build a tier, dropping repeated kinds.
    pub fn new(kinds: impl IntoIterator<Item = BackendKind>) -> Self {
        let mut out: Vec<BackendKind> = Vec::new();
        for kind in kinds {
            if !out.contains(&kind) {
                out.push(kind);
            }
        }
        Tier { kinds: out }
    }

    /// The empty tier: interpreter built-in kernels only.
    pub fn baseline() -> Self {
        Tier { kinds: Vec::new() }
    }

    pub fn is_baseline(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn kinds(&self) -> &[BackendKind] {
        &self.kinds
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn contains(&self, kind: BackendKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Returns true if both tiers use the same backends, in any order.
    pub fn same_backends(&self, other: &Tier) -> bool {
        self.len() == other.len() && self.kinds.iter().all(|k| other.contains(*k))
    }

    /// Returns true if every kind in this tier is in `enabled`.
    pub fn is_subset_of(&self, enabled: &HashSet<BackendKind>) -> bool {
        self.kinds.iter().all(|k| enabled.contains(k))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, kind) in self.kinds.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", kind)?;
        }
        write!(f, "]")
    }
}

impl FromIterator<BackendKind> for Tier {
    fn from_iter<I: IntoIterator<Item = BackendKind>>(iter: I) -> Self {
        Tier::new(iter)
    }
}

/// Tiers in preference order, most preferred first.
///
/// An order should end with the baseline tier so initialization can always
/// fall back to the CPU; [`has_baseline`](Self::has_baseline) checks this.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PriorityOrder {
    tiers: Vec<Tier>,
}

impl PriorityOrder {
    pub fn new(tiers: Vec<Tier>) -> Self {
        PriorityOrder { tiers }
    }

    /// NPU and GPU together, then GPU alone, then CPU.
    pub fn accelerated_default() -> Self {
        PriorityOrder::new(vec![
            Tier::new([BackendKind::NeuralProcessor, BackendKind::Gpu]),
            Tier::new([BackendKind::Gpu]),
            Tier::baseline(),
        ])
    }

    /// GPU, then CPU.
    pub fn gpu_only() -> Self {
        PriorityOrder::new(vec![Tier::new([BackendKind::Gpu]), Tier::baseline()])
    }

    pub fn cpu_only() -> Self {
        PriorityOrder::new(vec![Tier::baseline()])
    }

    /// [`accelerated_default`](Self::accelerated_default) restricted to the
    /// given backends.
    pub fn for_enabled(enabled: &HashSet<BackendKind>) -> Self {
        PriorityOrder::accelerated_default().restrict_to_enabled(enabled)
    }

    /// Keep only the tiers whose backends are all in `enabled`, in their
    /// original relative order.
    ///
    /// The baseline tier is a subset of every set and always survives.
    pub fn restrict_to_enabled(&self, enabled: &HashSet<BackendKind>) -> PriorityOrder {
        PriorityOrder {
            tiers: self
                .tiers
                .iter()
                .filter(|t| t.is_subset_of(enabled))
                .cloned()
                .collect(),
        }
    }

    pub fn has_baseline(&self) -> bool {
        self.tiers.iter().any(Tier::is_baseline)
    }

    pub fn tiers(&self) -> &[Tier] {
        &self.tiers
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tier> {
        self.tiers.iter()
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

impl FromIterator<Tier> for PriorityOrder {
    fn from_iter<I: IntoIterator<Item = Tier>>(iter: I) -> Self {
        PriorityOrder::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a PriorityOrder {
    type Item = &'a Tier;
    type IntoIter = std::slice::Iter<'a, Tier>;

    fn into_iter(self) -> Self::IntoIter {
        self.tiers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use BackendKind::*;

    fn set(kinds: &[BackendKind]) -> HashSet<BackendKind> {
        kinds.iter().copied().collect()
    }

    #[test]
    fn test_tier_dedup_keeps_order() {
        let t = Tier::new([Gpu, NeuralProcessor, Gpu]);
        assert_eq!(t.kinds(), &[Gpu, NeuralProcessor]);
        assert_eq!(t.to_string(), "[gpu, npu]");
    }

    #[test]
    fn test_tier_order_is_identity() {
        let a = Tier::new([NeuralProcessor, Gpu]);
        let b = Tier::new([Gpu, NeuralProcessor]);
        assert_ne!(a, b);
        assert!(a.same_backends(&b));
        assert!(!a.same_backends(&Tier::new([Gpu])));
        assert!(Tier::baseline().same_backends(&Tier::default()));
    }

    #[test]
    fn test_baseline() {
        let t = Tier::baseline();
        assert!(t.is_baseline());
        assert!(t.is_subset_of(&HashSet::new()));
        assert_eq!(t.to_string(), "[]");
    }

    #[test]
    fn test_restrict_keeps_subsets_in_order() {
        let order = PriorityOrder::accelerated_default();

        let gpu = order.restrict_to_enabled(&set(&[Gpu]));
        assert_eq!(gpu.tiers(), &[Tier::new([Gpu]), Tier::baseline()]);

        let all = order.restrict_to_enabled(&set(&[NeuralProcessor, Gpu, CpuBaseline]));
        assert_eq!(all, order);

        let none = order.restrict_to_enabled(&HashSet::new());
        assert_eq!(none, PriorityOrder::cpu_only());

        let npu = order.restrict_to_enabled(&set(&[NeuralProcessor]));
        assert_eq!(npu, PriorityOrder::cpu_only());
    }

    #[test]
    fn test_restrict_never_adds_tiers() {
        let order = PriorityOrder::new(vec![
            Tier::new([CpuBaseline]),
            Tier::new([NeuralProcessor]),
            Tier::new([Gpu, CpuBaseline]),
            Tier::new([NeuralProcessor]),
        ]);
        let subsets: [&[BackendKind]; 4] = [
            &[],
            &[NeuralProcessor],
            &[Gpu, CpuBaseline],
            &[NeuralProcessor, Gpu, CpuBaseline],
        ];
        for enabled in subsets {
            let enabled = set(enabled);
            let restricted = order.restrict_to_enabled(&enabled);
            let expected: Vec<Tier> = order
                .iter()
                .filter(|t| t.kinds().iter().all(|k| enabled.contains(k)))
                .cloned()
                .collect();
            assert_eq!(restricted.tiers(), expected.as_slice());
            assert!(restricted.len() <= order.len());
        }
    }

    #[test]
    fn test_presets() {
        assert!(PriorityOrder::accelerated_default().has_baseline());
        assert!(PriorityOrder::gpu_only().has_baseline());
        assert!(PriorityOrder::cpu_only().has_baseline());
        assert!(!PriorityOrder::new(vec![Tier::new([NeuralProcessor])]).has_baseline());
        assert_eq!(
            PriorityOrder::for_enabled(&BackendKind::default_enabled()),
            PriorityOrder::accelerated_default()
        );
    }

    #[test]
    fn test_parse_backend_kind() {
        assert_eq!("npu".parse::<BackendKind>().unwrap(), NeuralProcessor);
        assert_eq!("GPU".parse::<BackendKind>().unwrap(), Gpu);
        assert!("tpu".parse::<BackendKind>().is_err());
    }
}
