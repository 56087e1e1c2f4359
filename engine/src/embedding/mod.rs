//! Embedding Provider Abstraction
//!
//! Maps free text to fixed-length numeric vectors for semantic retrieval.
//! The trait keeps the actual model pluggable; the engine ships a
//! deterministic hash-based embedder so retrieval behavior is reproducible
//! without a model download.

use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Fixed-length numeric vector derived from text
pub type Embedding = Vec<f32>;

/// Default embedding dimensionality (matches common sentence-embedding models)
pub const DEFAULT_DIMENSION: usize = 384;

/// Maps text to a fixed-length vector. Implementations must be deterministic:
/// the same input text always yields the same output vector.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text into a vector of `dimension()` components.
    fn embed(&self, text: &str) -> Embedding;

    /// Dimensionality of every vector this provider produces.
    fn dimension(&self) -> usize;
}

/// Shared provider reference for passing across modules
pub type SharedEmbedder = Arc<dyn EmbeddingProvider>;

/// Deterministic reference embedder.
///
/// Derives a 64-bit hash `h` from the text and emits component
/// `i = sin(h + i) * 0.5 + 0.5`, so all components lie in [0, 1].
/// Identical texts always produce identical vectors, which makes
/// relevance scoring testable end to end.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Derive the seed hash for a text from the first 8 bytes of its SHA-256
    fn seed(text: &str) -> u64 {
        let digest = Sha256::digest(text.as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(bytes)
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Embedding {
        let h = Self::seed(text) as f64;
        (0..self.dimension)
            .map(|i| ((h + i as f64).sin() * 0.5 + 0.5) as f32)
            .collect()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Cosine similarity between two vectors, in [-1, 1].
///
/// Returns 0.0 if the dimensions mismatch or either vector has zero
/// magnitude. That is a defined fallback, not an error: callers treat
/// such pairs as simply unrelated.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for i in 0..a.len() {
        dot += a[i] * b[i];
        norm_a += a[i] * a[i];
        norm_b += b[i] * b[i];
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
