//! Fixed-dimension embedding vectors: similarity and wire encoding
//! (spec §4.2, §6 — "length-prefixed little-endian float32 byte sequences").

use cortex_core::error::EmbeddingError;

/// A single embedding vector. Dimension is fixed per project and checked
/// at every comparison (spec's invariant: cosine similarity is only
/// defined between equal-dimension vectors).
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    /// Wrap a raw vector.
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.0.len()
    }

    /// Borrow the underlying values.
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Encode as a length-prefixed (u32 LE dimension count) sequence of
    /// little-endian float32 values, as persisted by `cortex-store`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.0.len() * 4);
        buf.extend_from_slice(&(self.0.len() as u32).to_le_bytes());
        for v in &self.0 {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        buf
    }

    /// Decode a buffer produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EmbeddingError> {
        if bytes.len() < 4 {
            return Err(EmbeddingError::Unavailable(
                "truncated embedding buffer".into(),
            ));
        }
        let dim = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
        let expected_len = 4 + dim * 4;
        if bytes.len() != expected_len {
            return Err(EmbeddingError::Unavailable(format!(
                "embedding buffer length {} does not match declared dimension {dim}",
                bytes.len()
            )));
        }
        let mut values = Vec::with_capacity(dim);
        for chunk in bytes[4..].chunks_exact(4) {
            values.push(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
        }
        Ok(Self(values))
    }
}

/// Cosine similarity between two vectors, in `[-1, 1]`.
///
/// Fails with [`EmbeddingError::DimensionMismatch`] if the vectors have
/// different dimensions. A zero-magnitude vector yields similarity `0.0`
/// against anything (including itself) rather than `NaN`.
pub fn cosine_similarity(a: &EmbeddingVector, b: &EmbeddingVector) -> Result<f32, EmbeddingError> {
    if a.dim() != b.dim() {
        return Err(EmbeddingError::DimensionMismatch {
            a: a.dim(),
            b: b.dim(),
        });
    }
    let dot: f32 = a.as_slice().iter().zip(b.as_slice()).map(|(x, y)| x * y).sum();
    let norm_a = a.as_slice().iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.as_slice().iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (norm_a * norm_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = EmbeddingVector::new(vec![1.0, 2.0, 3.0]);
        let sim = cosine_similarity(&v, &v).unwrap();
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        let a = EmbeddingVector::new(vec![1.0, 0.0]);
        let b = EmbeddingVector::new(vec![0.0, 1.0]);
        let sim = cosine_similarity(&a, &b).unwrap();
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn mismatched_dimensions_error() {
        let a = EmbeddingVector::new(vec![1.0, 0.0]);
        let b = EmbeddingVector::new(vec![1.0, 0.0, 0.0]);
        let err = cosine_similarity(&a, &b).unwrap_err();
        assert!(matches!(err, EmbeddingError::DimensionMismatch { a: 2, b: 3 }));
    }

    #[test]
    fn zero_vector_has_zero_similarity() {
        let a = EmbeddingVector::new(vec![0.0, 0.0]);
        let b = EmbeddingVector::new(vec![1.0, 1.0]);
        assert_eq!(cosine_similarity(&a, &b).unwrap(), 0.0);
    }

    #[test]
    fn byte_round_trip() {
        let v = EmbeddingVector::new(vec![0.5, -1.25, 3.0]);
        let bytes = v.to_bytes();
        let decoded = EmbeddingVector::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, v);
    }

    #[test]
    fn truncated_bytes_error() {
        let err = EmbeddingVector::from_bytes(&[0, 1]).unwrap_err();
        assert!(matches!(err, EmbeddingError::Unavailable(_)));
    }
}
