//! Byte-level views of f64 payloads for the message and file layers.
//!
//! Message payloads travel in native byte order (all ranks of a job run
//! the same binary). Store payloads are always little-endian on disk.

use bytemuck::Pod;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Encode values as little-endian bytes, appending to `out`.
pub fn f64s_to_le(values: &[f64], out: &mut Vec<u8>) {
    out.reserve(values.len() * size_of::<f64>());
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

/// Decode little-endian bytes into `out`. `bytes.len()` must be exactly
/// `out.len() * 8`.
pub fn f64s_from_le(bytes: &[u8], out: &mut [f64]) -> Result<(), String> {
    expect_exact_len(bytes.len(), out.len() * size_of::<f64>())?;
    for (dst, chunk) in out.iter_mut().zip(bytes.chunks_exact(size_of::<f64>())) {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(chunk);
        *dst = f64::from_le_bytes(raw);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn le_encoding_preserves_bits() {
        let vals = [0.0, -0.0, 1.5, f64::MIN_POSITIVE, f64::NAN, 1e300];
        let mut bytes = Vec::new();
        f64s_to_le(&vals, &mut bytes);
        assert_eq!(bytes.len(), 48);
        let mut back = [0.0; 6];
        f64s_from_le(&bytes, &mut back).unwrap();
        for (a, b) in vals.iter().zip(&back) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let mut out = [0.0; 2];
        assert_eq!(
            f64s_from_le(&[0u8; 15], &mut out),
            Err("expected 16 bytes, got 15".to_string())
        );
    }

    #[test]
    fn native_cast_matches_len() {
        let mut vals = [1.0f64, 2.0];
        assert_eq!(cast_slice(&vals).len(), 16);
        cast_slice_mut(&mut vals)[..8].copy_from_slice(&3.0f64.to_ne_bytes());
        assert_eq!(vals[0], 3.0);
    }
}
