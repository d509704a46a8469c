//! Embedding generation and similarity
//!
//! - `EmbeddingProvider` trait over the offline FastEmbed model and the online
//!   Gemini client
//! - `EmbeddingAdapter` for the zero-vector fallback
//! - `BatchEmbedder` for concurrent, order-preserving batches
//! - cosine similarity helpers
mod adapter;
mod batch;
mod provider;
mod similarity;

pub use adapter::{is_zero_vector, EmbeddingAdapter};
pub use batch::{BatchEmbedder, BatchResult};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use similarity::{cosine_similarity, cosine_similarity_opt, find_similar};

use crate::config::Config;
use crate::llm::GeminiClient;
use std::sync::Arc;

/// Provider that always fails, used when no backend could be initialized
///
/// Every call then goes through the adapter's zero-vector fallback.
pub struct UnavailableProvider {
    reason: String,
    dimension: usize,
}

impl UnavailableProvider {
    pub fn new(reason: impl Into<String>, dimension: usize) -> Self {
        Self {
            reason: reason.into(),
            dimension,
        }
    }
}

impl EmbeddingProvider for UnavailableProvider {
    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::InitializationError(self.reason.clone()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "unavailable"
    }
}

/// Build the provider selected by `embedding.mode`
///
/// Initialization failures are logged and replaced by [`UnavailableProvider`];
/// complaint submission never depends on the embedding backend being up.
pub fn provider_from_config(config: &Config) -> Arc<dyn EmbeddingProvider> {
    let dimension = config.embedding.dimension;

    let provider: Result<Arc<dyn EmbeddingProvider>, EmbeddingError> =
        match config.embedding.mode.as_str() {
            "offline" => FastEmbedProvider::new(&config.embedding.model)
                .map(|p| Arc::new(p) as Arc<dyn EmbeddingProvider>),
            _ => GeminiClient::from_config(&config.llm, dimension)
                .map(|c| Arc::new(c) as Arc<dyn EmbeddingProvider>)
                .map_err(|e| EmbeddingError::InitializationError(e.to_string())),
        };

    match provider {
        Ok(provider) => provider,
        Err(e) => {
            tracing::warn!("Embedding backend unavailable, vectors will be zero: {}", e);
            Arc::new(UnavailableProvider::new(e.to_string(), dimension))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_provider_falls_back_to_zero() {
        let adapter = EmbeddingAdapter::new(Arc::new(UnavailableProvider::new("down", 8)), 8);
        let vector = adapter.generate_embedding("mess food was cold");
        assert_eq!(vector, vec![0.0; 8]);
    }
}
