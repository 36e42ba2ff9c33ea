//! Semantic similarity collaborator
//!
//! The engine only needs one thing from an embedding service: a fixed-length vector
//! per piece of text. Cosine similarity is computed here. Remote providers implement
//! [`Embedder`]; [`TokenHashEmbedder`] is a deterministic, dependency-free provider
//! used offline and in tests.

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding service unavailable: {0}")]
    Unavailable(String),
    #[error("embedding dimensions differ ({left} vs {right})")]
    DimensionMismatch { left: usize, right: usize },
    #[error("nothing to embed")]
    EmptyInput,
}

/// Text → fixed-length vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Length of every vector this provider returns.
    fn dimension(&self) -> usize;
}

/// Cosine similarity of two embeddings. Zero vectors have similarity 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, EmbeddingError> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return Ok(0.0);
    }
    Ok(dot / (na.sqrt() * nb.sqrt()))
}

// ============================================================================
// Deterministic token-hash embeddings
// ============================================================================

pub const TOKEN_HASH_DIM: usize = 4096;

fn fnv1a64(s: &str) -> u64 {
    let mut h: u64 = 14695981039346656037;
    for b in s.as_bytes() {
        h ^= *b as u64;
        h = h.wrapping_mul(1099511628211);
    }
    h
}

/// Lowercase alphanumeric word tokens; `fund_name: X` → `["fund", "name", "x"]`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Signed feature hashing over word tokens, L2-normalised.
#[derive(Debug, Clone)]
pub struct TokenHashEmbedder {
    dimension: usize,
}

impl TokenHashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dimension];
        for t in tokenize(text) {
            let h = fnv1a64(&t);
            let idx = (h % self.dimension as u64) as usize;
            let sign = if ((h >> 32) & 1) == 0 { 1.0 } else { -1.0 };
            v[idx] += sign;
        }
        let norm2: f32 = v.iter().map(|x| x * x).sum();
        if norm2 > 0.0 {
            let inv = 1.0 / norm2.sqrt();
            for x in v.iter_mut() {
                *x *= inv;
            }
        }
        v
    }
}

impl Default for TokenHashEmbedder {
    fn default() -> Self {
        Self::new(TOKEN_HASH_DIM)
    }
}

#[async_trait]
impl Embedder for TokenHashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
