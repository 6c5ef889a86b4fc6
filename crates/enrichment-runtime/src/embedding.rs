//! Embedding collaborator trait.
//!
//! The embedding service itself is out of scope; this module only
//! defines the `get_embedding` operation plus the cosine-similarity free
//! function the in-memory store calls, keeping the similarity math
//! colocated with the vector type rather than in the caller.

use async_trait::async_trait;
use thiserror::Error;

/// Estimated USD cost per call, e.g. Cohere embed-multilingual-v3.0 (§6).
pub const EMBEDDING_COST_PER_CALL: f64 = 2e-5;

#[derive(Debug, Error, Clone)]
pub enum EmbeddingError {
    #[error("embedding provider error: {0}")]
    Provider(String),
    #[error("embedding provider not configured")]
    NotConfigured,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn get_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Deterministic stand-in for tests: hashes tokens into a small vector
/// so that similar texts produce similar (not identical) vectors.
pub struct MockEmbeddingProvider {
    pub dimension: usize,
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self { dimension: 32 }
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn get_embedding(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vec = vec![0f32; self.dimension];
        for token in text.split_whitespace() {
            let mut hash: u64 = 1469598103934665603;
            for b in token.as_bytes() {
                hash ^= *b as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let idx = (hash as usize) % self.dimension;
            vec[idx] += 1.0;
        }
        Ok(vec)
    }
}

/// Cosine similarity over two equal-length embedding vectors. Returns 0
/// for mismatched lengths or zero-norm vectors rather than panicking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_vectors_have_similarity_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn orthogonal_vectors_have_similarity_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn mock_provider_is_deterministic() {
        let provider = MockEmbeddingProvider::default();
        let a = provider.get_embedding("hello world").await.unwrap();
        let b = provider.get_embedding("hello world").await.unwrap();
        assert_eq!(a, b);
    }
}
