use std::fmt;

use crate::error::{Result, TensorError};

/// A tensor shape: an ordered sequence of positive dimension sizes.
///
/// A rank-0 shape describes a scalar and holds one element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Create a shape from dimension sizes.
    ///
    /// # Errors
    /// Returns `TensorError::InvalidDimension` if any dimension is zero.
    pub fn new(dims: Vec<usize>) -> Result<Self> {
        if let Some(axis) = dims.iter().position(|&d| d == 0) {
            return Err(TensorError::InvalidDimension { axis, dim: 0 });
        }
        Ok(Shape { dims })
    }

    /// Create a shape from the signed dimensions a native runtime reports.
    ///
    /// Dynamic (`-1`) and empty dimensions are rejected.
    pub fn from_native(dims: &[i32]) -> Result<Self> {
        let mut out = Vec::with_capacity(dims.len());
        for (axis, &d) in dims.iter().enumerate() {
            if d <= 0 {
                return Err(TensorError::InvalidDimension {
                    axis,
                    dim: d as i64,
                });
            }
            out.push(d as usize);
        }
        Ok(Shape { dims: out })
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements (product of all dimension sizes).
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Returns a reference to the underlying dimension sizes.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numel() {
        let s = Shape::new(vec![1, 8400, 84]).unwrap();
        assert_eq!(s.ndim(), 3);
        assert_eq!(s.numel(), 8400 * 84);
    }

    #[test]
    fn test_scalar() {
        let s = Shape::new(vec![]).unwrap();
        assert_eq!(s.ndim(), 0);
        assert_eq!(s.numel(), 1);
    }

    #[test]
    fn test_zero_dim_rejected() {
        let err = Shape::new(vec![1, 0, 3]).unwrap_err();
        assert!(matches!(err, TensorError::InvalidDimension { axis: 1, dim: 0 }));
    }

    #[test]
    fn test_from_native() {
        let s = Shape::from_native(&[1, 640, 640, 3]).unwrap();
        assert_eq!(s.dims(), &[1, 640, 640, 3]);
        assert!(matches!(
            Shape::from_native(&[1, -1, 3]),
            Err(TensorError::InvalidDimension { axis: 1, dim: -1 })
        ));
    }

    #[test]
    fn test_display() {
        let s = Shape::new(vec![1, 2, 3]).unwrap();
        assert_eq!(s.to_string(), "[1, 2, 3]");
    }
}
