//! Conversion of raw native output buffers into `f32` data.
//!
//! 32-bit float buffers are reinterpreted in native byte order, 16-bit float
//! buffers are widened, and 8-bit fixed-point buffers are dequantized with
//! the tensor's [`QuantParams`]:
//!
//! ```text
//! f32_value = (raw - zero_point) * scale
//! ```

use half::f16;

use crate::dtype::ElementType;
use crate::error::{Result, TensorError};
use crate::quant::QuantParams;

/// Dequantize 8-bit fixed-point data, one output element per input byte.
///
/// With `unsigned` set each byte is read as a `u8` in `[0, 255]`, otherwise
/// as a two's-complement `i8` in `[-128, 127]`. A scale and offset that are
/// both below [`ABSENT_THRESHOLD`](crate::quant::ABSENT_THRESHOLD) are
/// treated as the identity transform.
///
/// # Example
///
/// ```
/// use dr_tensor::dequantize;
///
/// let raw = [200u8, 0, 12];
/// assert_eq!(dequantize(&raw, 1.0, 0.0, true), vec![200.0, 0.0, 12.0]);
/// assert_eq!(dequantize(&raw, 0.5, 10.0, false), vec![-33.0, -5.0, 1.0]);
/// assert_eq!(dequantize(&[10], 0.0, 0.0, true), vec![10.0]);
/// ```
pub fn dequantize(raw: &[u8], scale: f32, offset: f32, unsigned: bool) -> Vec<f32> {
    let mut out = Vec::with_capacity(raw.len());
    dequantize_into(raw, QuantParams::new(scale, offset), unsigned, &mut out);
    out
}

/// Like [`dequantize`], but reuses `out`'s allocation.
pub fn dequantize_into(raw: &[u8], params: QuantParams, unsigned: bool, out: &mut Vec<f32>) {
    let params = params.normalized();
    out.clear();
    out.reserve(raw.len());
    if unsigned {
        out.extend(
            raw.iter()
                .map(|&b| (b as f32 - params.zero_point) * params.scale),
        );
    } else {
        out.extend(
            raw.iter()
                .map(|&b| (b as i8 as f32 - params.zero_point) * params.scale),
        );
    }
}

/// Quantize a float to its 8-bit fixed-point representation.
///
/// The inverse of [`dequantize`]: rounds to the nearest step and saturates
/// at the type's range. The result is the raw byte as stored in a tensor
/// buffer (for signed mode, the two's-complement bit pattern).
pub fn quantize(value: f32, params: QuantParams, unsigned: bool) -> u8 {
    let q = (value / params.scale + params.zero_point).round();
    if unsigned {
        q.clamp(0.0, 255.0) as u8
    } else {
        q.clamp(-128.0, 127.0) as i8 as u8
    }
}

/// Reinterpret a native-endian `f32` buffer.
pub fn f32_from_bytes(raw: &[u8], out: &mut Vec<f32>) -> Result<()> {
    check_aligned(raw, 4)?;
    out.clear();
    out.extend(
        raw.chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]])),
    );
    Ok(())
}

/// Widen a native-endian IEEE 754 half-precision buffer to `f32`.
pub fn f16_from_bytes(raw: &[u8], out: &mut Vec<f32>) -> Result<()> {
    check_aligned(raw, 2)?;
    out.clear();
    out.extend(
        raw.chunks_exact(2)
            .map(|c| f16::from_ne_bytes([c[0], c[1]]).to_f32()),
    );
    Ok(())
}

/// Convert one output buffer according to its element type.
///
/// `params` is only consulted for fixed-point types; absent parameters are
/// normalized (see [`QuantParams::normalized`]).
///
/// # Errors
/// - [`TensorError::NotConvertible`] for types outside the float and 8-bit
///   fixed-point families.
/// - [`TensorError::Misaligned`] if a float buffer is not a whole number of
///   elements.
pub fn materialize(
    element_type: ElementType,
    raw: &[u8],
    params: QuantParams,
    out: &mut Vec<f32>,
) -> Result<()> {
    match element_type {
        ElementType::Float32 => f32_from_bytes(raw, out),
        ElementType::Float16 => f16_from_bytes(raw, out),
        ElementType::Uint8 => {
            dequantize_into(raw, params, true, out);
            Ok(())
        }
        ElementType::Int8 => {
            dequantize_into(raw, params, false, out);
            Ok(())
        }
        other => Err(TensorError::NotConvertible(other)),
    }
}

fn check_aligned(raw: &[u8], elem_size: usize) -> Result<()> {
    if raw.len() % elem_size != 0 {
        return Err(TensorError::Misaligned {
            len: raw.len(),
            elem_size,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_unsigned_identity() {
        let out = dequantize(&[200, 0], 1.0, 0.0, true);
        assert_eq!(out, vec![200.0, 0.0]);
    }

    #[test]
    fn test_unsigned_discards_sign() {
        // 0xFF is 255 unsigned, not -1.
        let out = dequantize(&[0xFF], 1.0, 0.0, true);
        assert_eq!(out, vec![255.0]);
    }

    #[test]
    fn test_signed_two_complement() {
        let out = dequantize(&[0xFF, 0x80, 0x7F], 1.0, 0.0, false);
        assert_eq!(out, vec![-1.0, -128.0, 127.0]);
    }

    #[test]
    fn test_scale_and_offset() {
        let out = dequantize(&[138], 0.5, 128.0, true);
        assert_relative_eq!(out[0], 5.0);

        let out = dequantize(&[(-20i8) as u8], 0.25, -4.0, false);
        assert_relative_eq!(out[0], -4.0);
    }

    #[test]
    fn test_absent_params_act_as_identity() {
        let mut out = Vec::new();
        let params = QuantParams::new(0.0, 0.0).normalized();
        materialize(ElementType::Uint8, &[10], params, &mut out).unwrap();
        assert_eq!(out, vec![10.0]);
    }

    #[test]
    fn test_near_zero_params_identity() {
        assert_eq!(dequantize(&[10], 0.0, 0.0, true), vec![10.0]);
        assert_eq!(dequantize(&[10], 5e-5, 9e-5, false), vec![10.0]);

        let mut out = Vec::new();
        materialize(
            ElementType::Int8,
            &[(-3i8) as u8],
            QuantParams::new(0.0, 0.0),
            &mut out,
        )
        .unwrap();
        assert_eq!(out, vec![-3.0]);
    }

    #[test]
    fn test_zero_scale_with_offset_is_kept() {
        // Only the offset is large, so the parameters are real.
        let out = dequantize(&[200], 0.0, 128.0, true);
        assert_eq!(out, vec![0.0]);
    }

    #[test]
    fn test_quantize_roundtrip_within_one_step() {
        let params = QuantParams::new(0.5, 10.0);
        for &f in &[-40.0f32, -3.3, 0.0, 0.26, 7.75, 50.1] {
            let raw = quantize(f, params, false);
            let back = dequantize(&[raw], params.scale, params.zero_point, false)[0];
            assert!((back - f).abs() <= 0.5, "{} -> {} -> {}", f, raw as i8, back);
        }
    }

    #[test]
    fn test_quantize_saturates() {
        let params = QuantParams::new(1.0, 0.0);
        assert_eq!(quantize(1000.0, params, false) as i8, 127);
        assert_eq!(quantize(-1000.0, params, false) as i8, -128);
        assert_eq!(quantize(-5.0, params, true), 0);
        assert_eq!(quantize(300.0, params, true), 255);
    }

    #[test]
    fn test_float32_passthrough() {
        let values = [1.5f32, -2.25, 0.0, 1e-3];
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let mut out = Vec::new();
        // Quantization parameters are ignored for floats.
        materialize(
            ElementType::Float32,
            &raw,
            QuantParams::new(0.1, 3.0),
            &mut out,
        )
        .unwrap();
        assert_eq!(out, values);
    }

    #[test]
    fn test_float16_widening() {
        let values = [f16::from_f32(0.5), f16::from_f32(-3.0)];
        let raw: Vec<u8> = values.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let mut out = Vec::new();
        materialize(ElementType::Float16, &raw, QuantParams::IDENTITY, &mut out).unwrap();
        assert_eq!(out, vec![0.5, -3.0]);
    }

    #[test]
    fn test_misaligned_float_buffer() {
        let mut out = Vec::new();
        let err = f32_from_bytes(&[0, 0, 0], &mut out).unwrap_err();
        assert!(matches!(err, TensorError::Misaligned { len: 3, elem_size: 4 }));
    }

    #[test]
    fn test_not_convertible() {
        let mut out = Vec::new();
        let err = materialize(ElementType::Int32, &[0; 4], QuantParams::IDENTITY, &mut out)
            .unwrap_err();
        assert!(matches!(err, TensorError::NotConvertible(ElementType::Int32)));
    }

    #[test]
    fn test_into_reuses_buffer() {
        let mut out = vec![9.0; 16];
        dequantize_into(&[1, 2], QuantParams::IDENTITY, true, &mut out);
        assert_eq!(out, vec![1.0, 2.0]);
    }
}
