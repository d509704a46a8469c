/// Concurrent embedding of many complaint texts
use super::EmbeddingAdapter;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Result of a batch run
#[derive(Debug)]
pub struct BatchResult {
    /// One vector per input, in input order; failures hold the zero vector
    pub embeddings: Vec<Vec<f32>>,
    pub failed: usize,
    pub duration_ms: u64,
}

/// Embeds texts concurrently while preserving input order
///
/// Each text goes through [`EmbeddingAdapter::generate_embedding`] on its own, so
/// one failing item only zeroes its own slot. Provider calls are blocking and run
/// on the blocking pool, bounded by `max_concurrent` permits.
pub struct BatchEmbedder {
    adapter: EmbeddingAdapter,
    max_concurrent: usize,
}

impl BatchEmbedder {
    pub fn new(adapter: EmbeddingAdapter, max_concurrent: usize) -> Self {
        Self {
            adapter,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Embed every text, returning vectors in input order
    pub async fn embed_all(&self, texts: Vec<String>) -> BatchResult {
        let start = std::time::Instant::now();
        let total = texts.len();

        info!("Embedding batch of {} complaints", total);

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut handles = Vec::with_capacity(total);

        for text in texts {
            let semaphore = Arc::clone(&semaphore);
            let adapter = self.adapter.clone();
            handles.push(tokio::spawn(async move {
                // Closed semaphores never happen here; treat it like a provider failure
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return None,
                };
                tokio::task::spawn_blocking(move || adapter.try_embed(&text))
                    .await
                    .ok()
                    .and_then(|result| match result {
                        Ok(vector) => Some(vector),
                        Err(e) => {
                            debug!("Batch item failed: {}", e);
                            None
                        }
                    })
            }));
        }

        let mut embeddings = Vec::with_capacity(total);
        let mut failed = 0;

        for handle in handles {
            match handle.await.ok().flatten() {
                Some(vector) => embeddings.push(vector),
                None => {
                    failed += 1;
                    embeddings.push(self.adapter.zero_vector());
                }
            }
        }

        if failed > 0 {
            warn!("{} of {} embeddings fell back to zero vectors", failed, total);
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Batch embedding complete: {} ok, {} failed, {}ms",
            total - failed,
            failed,
            duration_ms
        );

        BatchResult {
            embeddings,
            failed,
            duration_ms,
        }
    }
}
