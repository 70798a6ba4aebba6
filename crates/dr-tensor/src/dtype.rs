use std::fmt;

/// Element type of a model input or output tensor.
///
/// Only a subset of these can be turned into `f32` by the marshaller:
/// 32-bit and 16-bit floats pass through, 8-bit signed and unsigned fixed
/// point are dequantized. Everything else is reported but left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    Float32,
    Float16,
    Float64,
    Int8,
    Uint8,
    Int16,
    Int32,
    Int64,
    Bool,
    /// Type code the runtime reported but this crate does not model.
    Unknown(i32),
}

impl ElementType {
    /// Size in bytes of a single element, or `None` for unknown types.
    pub fn size_in_bytes(&self) -> Option<usize> {
        match self {
            ElementType::Int8 | ElementType::Uint8 | ElementType::Bool => Some(1),
            ElementType::Float16 | ElementType::Int16 => Some(2),
            ElementType::Float32 | ElementType::Int32 => Some(4),
            ElementType::Float64 | ElementType::Int64 => Some(8),
            ElementType::Unknown(_) => None,
        }
    }

    /// Returns true for the 8-bit fixed-point types that carry a scale and
    /// zero-offset.
    pub fn is_fixed_point(&self) -> bool {
        matches!(self, ElementType::Int8 | ElementType::Uint8)
    }

    /// Returns true if the marshaller can produce `f32` data for this type.
    pub fn is_convertible(&self) -> bool {
        matches!(
            self,
            ElementType::Float32 | ElementType::Float16 | ElementType::Int8 | ElementType::Uint8
        )
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Float32 => write!(f, "float32"),
            ElementType::Float16 => write!(f, "float16"),
            ElementType::Float64 => write!(f, "float64"),
            ElementType::Int8 => write!(f, "int8"),
            ElementType::Uint8 => write!(f, "uint8"),
            ElementType::Int16 => write!(f, "int16"),
            ElementType::Int32 => write!(f, "int32"),
            ElementType::Int64 => write!(f, "int64"),
            ElementType::Bool => write!(f, "bool"),
            ElementType::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_in_bytes() {
        assert_eq!(ElementType::Uint8.size_in_bytes(), Some(1));
        assert_eq!(ElementType::Float16.size_in_bytes(), Some(2));
        assert_eq!(ElementType::Float32.size_in_bytes(), Some(4));
        assert_eq!(ElementType::Int64.size_in_bytes(), Some(8));
        assert_eq!(ElementType::Unknown(42).size_in_bytes(), None);
    }

    #[test]
    fn test_convertible() {
        assert!(ElementType::Float32.is_convertible());
        assert!(ElementType::Int8.is_convertible());
        assert!(ElementType::Uint8.is_convertible());
        assert!(!ElementType::Int32.is_convertible());
        assert!(!ElementType::Unknown(3).is_convertible());
        assert!(!ElementType::Float32.is_fixed_point());
    }

    #[test]
    fn test_display() {
        assert_eq!(ElementType::Uint8.to_string(), "uint8");
        assert_eq!(ElementType::Unknown(17).to_string(), "unknown(17)");
    }
}
