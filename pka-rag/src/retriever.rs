//! Query-time context retrieval.

use std::sync::Arc;

use tracing::debug;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;
use crate::index::VectorIndex;

/// Retrieves context passages for a query by embedding it and searching a
/// built [`VectorIndex`].
///
/// Each returned passage is truncated to `max_context_chars` characters so
/// a handful of long chunks cannot crowd the prompt.
pub struct ContextRetriever {
    provider: Arc<dyn EmbeddingProvider>,
    index: VectorIndex,
    max_context_chars: usize,
}

impl ContextRetriever {
    /// Create a retriever over a built index.
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        index: VectorIndex,
        max_context_chars: usize,
    ) -> Self {
        Self { provider, index, max_context_chars }
    }

    /// Number of entries in the underlying index.
    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    /// Embed `query` and return the text of the `top_k` closest chunks,
    /// most similar first, each truncated to the configured character
    /// budget.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        let embedding = self.provider.embed(query).await?;
        let results = self.index.search(&embedding, top_k)?;
        debug!(query_len = query.len(), results = results.len(), "retrieved context");

        Ok(results.into_iter().map(|r| truncate_chars(r.text, self.max_context_chars)).collect())
    }
}

/// Truncate to at most `max` characters, respecting char boundaries.
fn truncate_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::index::IndexEntry;

    /// Maps known strings to fixed unit vectors.
    struct FixtureEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FixtureEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(match text {
                "fruit" => vec![1.0, 0.0],
                _ => vec![0.0, 1.0],
            })
        }

        fn dimensions(&self) -> usize {
            2
        }

        fn provider_name(&self) -> &str {
            "fixture"
        }
    }

    fn entry(text: &str, embedding: Vec<f32>) -> IndexEntry {
        IndexEntry { text: text.to_string(), embedding, metadata: HashMap::new() }
    }

    #[tokio::test]
    async fn retrieves_closest_chunks_first() {
        let index = VectorIndex::build(vec![
            entry("apples and oranges", vec![0.9, 0.1]),
            entry("stars and planets", vec![0.1, 0.9]),
        ])
        .unwrap();
        let retriever = ContextRetriever::new(Arc::new(FixtureEmbedder), index, 100);

        let context = retriever.retrieve("fruit", 2).await.unwrap();
        assert_eq!(context, vec!["apples and oranges", "stars and planets"]);
    }

    #[tokio::test]
    async fn truncates_long_passages() {
        let index =
            VectorIndex::build(vec![entry("a very long passage indeed", vec![1.0, 0.0])]).unwrap();
        let retriever = ContextRetriever::new(Arc::new(FixtureEmbedder), index, 6);

        let context = retriever.retrieve("fruit", 1).await.unwrap();
        assert_eq!(context, vec!["a very"]);
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo".to_string(), 3), "hél");
        assert_eq!(truncate_chars("short".to_string(), 100), "short");
    }
}
