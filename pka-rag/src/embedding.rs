//! Embedding provider trait and batch helpers.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{RagError, Result};

/// A backend that turns text into fixed-dimension vectors.
///
/// Implementations wrap concrete services (OpenAI, local models, test
/// doubles) behind one async interface. The default
/// [`embed_batch`](EmbeddingProvider::embed_batch) embeds sequentially;
/// backends with native batching should override it.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text (document chunk or query).
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving input order.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// once per input.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// The dimensionality of vectors produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short name for error messages and logging.
    fn provider_name(&self) -> &str {
        "unknown"
    }
}

/// Embed `texts` in batches of at most `batch_size`, verifying that every
/// batch comes back with exactly one vector per input, in input order.
///
/// `batch_size` is a hint only; correctness does not depend on it.
///
/// # Errors
///
/// Returns [`RagError::Embedding`] if the backend fails or returns a
/// mismatched count — short responses are never silently truncated.
pub async fn embed_in_batches(
    provider: &dyn EmbeddingProvider,
    texts: &[&str],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>> {
    let batch_size = batch_size.max(1);
    let mut vectors = Vec::with_capacity(texts.len());

    for batch in texts.chunks(batch_size) {
        let batch_vectors = provider.embed_batch(batch).await?;
        if batch_vectors.len() != batch.len() {
            return Err(RagError::Embedding {
                provider: provider.provider_name().to_string(),
                message: format!(
                    "backend returned {} vectors for {} inputs",
                    batch_vectors.len(),
                    batch.len()
                ),
            });
        }
        vectors.extend(batch_vectors);
    }

    debug!(count = vectors.len(), "embedded texts");
    Ok(vectors)
}
