//! Zero-vector fallback around an embedding provider
use super::{EmbeddingError, EmbeddingProvider};
use std::sync::Arc;
use tracing::warn;

/// Wraps a provider so that embedding never fails
///
/// Any provider error, or a vector of the wrong length, yields an all-zero vector
/// of the configured dimension. Consumers treat a zero vector as "no signal".
#[derive(Clone)]
pub struct EmbeddingAdapter {
    provider: Arc<dyn EmbeddingProvider>,
    dimension: usize,
}

impl EmbeddingAdapter {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, dimension: usize) -> Self {
        Self {
            provider,
            dimension,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    /// Embed `text`, returning the zero vector on any failure
    pub fn generate_embedding(&self, text: &str) -> Vec<f32> {
        match self.try_embed(text) {
            Ok(vector) => vector,
            Err(e) => {
                warn!("Embedding generation failed, using zero vector: {}", e);
                self.zero_vector()
            }
        }
    }

    /// Embed `text`, surfacing the provider error
    pub fn try_embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vector = self.provider.embed(text)?;
        if vector.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Ok(vector)
    }

    /// Embed each text independently; one failure only zeroes its own slot
    pub fn generate_batch(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.generate_embedding(t)).collect()
    }

    pub fn zero_vector(&self) -> Vec<f32> {
        vec![0.0; self.dimension]
    }
}

/// True when every component is zero (including the empty vector)
pub fn is_zero_vector(vector: &[f32]) -> bool {
    vector.iter().all(|v| *v == 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        vector: Vec<f32>,
    }

    impl EmbeddingProvider for FixedProvider {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if text == "fail" {
                return Err(EmbeddingError::GenerationError("boom".to_string()));
            }
            Ok(self.vector.clone())
        }

        fn dimension(&self) -> usize {
            self.vector.len()
        }

        fn model_name(&self) -> &str {
            "fixed"
        }
    }

    fn adapter(vector: Vec<f32>, dimension: usize) -> EmbeddingAdapter {
        EmbeddingAdapter::new(Arc::new(FixedProvider { vector }), dimension)
    }

    #[test]
    fn test_success_passes_through() {
        let adapter = adapter(vec![0.1, 0.2, 0.3], 3);
        assert_eq!(adapter.generate_embedding("ok"), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_failure_yields_zero_vector() {
        let adapter = adapter(vec![0.1, 0.2, 0.3], 3);
        let vector = adapter.generate_embedding("fail");
        assert_eq!(vector.len(), 3);
        assert!(is_zero_vector(&vector));
    }

    #[test]
    fn test_dimension_mismatch_yields_zero_vector() {
        let adapter = adapter(vec![0.1, 0.2], 4);
        assert_eq!(adapter.generate_embedding("ok"), vec![0.0; 4]);
    }

    #[test]
    fn test_batch_failures_are_independent() {
        let adapter = adapter(vec![1.0, 1.0], 2);
        let texts = vec!["a".to_string(), "fail".to_string(), "b".to_string()];
        let vectors = adapter.generate_batch(&texts);

        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], vec![1.0, 1.0]);
        assert!(is_zero_vector(&vectors[1]));
        assert_eq!(vectors[2], vec![1.0, 1.0]);
    }
}
