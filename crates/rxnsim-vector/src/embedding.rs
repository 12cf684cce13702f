//! Embedding provider seam.
//!
//! The reaction fingerprint model lives outside this crate. It is reached
//! through [`EmbeddingProvider`], which turns a batch of reaction SMILES into
//! one vector per input, in input order. `MockEmbedding` provides
//! deterministic hash-based vectors for testing.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};

use rxnsim_core::error::{Result, SimError};

/// Service that converts reaction descriptors into fixed-dimension vectors.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of inputs.
    ///
    /// Implementations must return exactly one vector per input, in the same
    /// order, each of length [`dimensions`](Self::dimensions).
    fn embed_batch(&self, inputs: &[String]) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send;

    /// Return the dimensionality of vectors produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Mock provider returning deterministic vectors derived from a hash of
/// each input.
///
/// Unlike a sentence model's pooled output these vectors are deliberately
/// left unnormalized, like raw reaction fingerprints, so that callers
/// exercise the store's normalization step.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    dimensions: usize,
}

impl MockEmbedding {
    /// Mock with the 256 components of a BERT reaction fingerprint.
    pub fn new() -> Self {
        Self::with_dimensions(256)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        (0..self.dimensions)
            .map(|i| {
                let mut hasher = DefaultHasher::new();
                text.hash(&mut hasher);
                i.hash(&mut hasher);
                let h = hasher.finish();
                // Scale to [-2, 2) so norms vary between inputs.
                (((h as f64) / (u64::MAX as f64)) * 4.0 - 2.0) as f32
            })
            .collect()
    }
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for MockEmbedding {
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
        inputs
            .iter()
            .map(|text| {
                if text.is_empty() {
                    return Err(SimError::Embedding("cannot embed empty input".to_string()));
                }
                Ok(self.hash_to_vector(text))
            })
            .collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_mock_embedding_dimension() {
        let provider = MockEmbedding::new();
        let out = provider.embed_batch(&inputs(&["CC>>CO"])).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), 256);
        assert_eq!(provider.dimensions(), 256);
    }

    #[tokio::test]
    async fn test_mock_embedding_deterministic_and_ordered() {
        let provider = MockEmbedding::with_dimensions(32);
        let a = provider
            .embed_batch(&inputs(&["CC>>CO", "O>>O"]))
            .await
            .unwrap();
        let b = provider
            .embed_batch(&inputs(&["O>>O", "CC>>CO"]))
            .await
            .unwrap();
        assert_eq!(a[0], b[1]);
        assert_eq!(a[1], b[0]);
        assert_ne!(a[0], a[1]);
    }

    #[tokio::test]
    async fn test_mock_embedding_empty_input() {
        let provider = MockEmbedding::new();
        let result = provider.embed_batch(&inputs(&["CC>>CO", ""])).await;
        assert!(matches!(result, Err(SimError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_mock_embedding_values_in_range() {
        let provider = MockEmbedding::with_dimensions(64);
        let out = provider.embed_batch(&inputs(&["N>>N"])).await.unwrap();
        for val in &out[0] {
            assert!(
                (-2.0..=2.0).contains(val),
                "Value {} out of range [-2, 2]",
                val
            );
        }
    }
}
