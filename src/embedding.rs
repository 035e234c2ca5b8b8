use thiserror::Error;

/// Dimension of the timbre embedding produced by the analysis pipeline.
pub const EMBEDDING_DIM: usize = 512;

const F32_BYTES: usize = std::mem::size_of::<f32>();

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("embedding blob length: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("embedding dimension {0} overflows byte length")]
    Overflow(usize),
    #[error("embedding has {actual} values, expected {expected}")]
    Dimension { expected: usize, actual: usize },
}

/// Encode a vector as little-endian IEEE-754 f32s, `4 * len` bytes.
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode a blob written by [`encode_embedding`]. Bit-exact: re-encoding the
/// result yields the same bytes.
pub fn decode_embedding(blob: &[u8], dimension: usize) -> Result<Vec<f32>, EmbeddingError> {
    let expected = dimension
        .checked_mul(F32_BYTES)
        .ok_or(EmbeddingError::Overflow(dimension))?;
    if blob.len() != expected {
        return Err(EmbeddingError::Length {
            expected,
            actual: blob.len(),
        });
    }

    Ok(blob
        .chunks_exact(F32_BYTES)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

/// Accept an already-decoded vector only if it has exactly `dimension` values.
pub fn check_dimension(vector: Vec<f32>, dimension: usize) -> Result<Vec<f32>, EmbeddingError> {
    if vector.len() != dimension {
        return Err(EmbeddingError::Dimension {
            expected: dimension,
            actual: vector.len(),
        });
    }
    Ok(vector)
}

/// Cosine similarity in [-1, 1], accumulated in f64.
/// `None` for empty, mismatched, zero-norm or non-finite input.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if !denom.is_finite() || denom < 1e-12 {
        return None;
    }
    let sim = dot / denom;
    sim.is_finite().then(|| sim.clamp(-1.0, 1.0))
}
