//! End-to-end indexing pipeline: directory → documents → chunks →
//! embeddings → [`VectorIndex`].

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::Document;
use crate::embedding::{EmbeddingProvider, embed_in_batches};
use crate::error::{RagError, Result};
use crate::index::{IndexEntry, VectorIndex};
use crate::loader::{DEFAULT_EXTENSIONS, load_documents};
use crate::retriever::ContextRetriever;

/// Wires a chunker and an embedding provider into a reusable indexing
/// pipeline.
///
/// Construct with [`builder`](KnowledgePipeline::builder); the chunker
/// defaults to a [`RecursiveChunker`] sized from the config.
pub struct KnowledgePipeline {
    config: RagConfig,
    provider: Arc<dyn EmbeddingProvider>,
    chunker: Box<dyn Chunker>,
}

impl std::fmt::Debug for KnowledgePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgePipeline").field("config", &self.config).finish_non_exhaustive()
    }
}

impl KnowledgePipeline {
    pub fn builder() -> KnowledgePipelineBuilder {
        KnowledgePipelineBuilder::default()
    }

    /// Chunk, embed, and index a set of already-loaded documents.
    pub async fn index_documents(&self, documents: &[Document]) -> Result<VectorIndex> {
        let chunks: Vec<_> = documents.iter().flat_map(|doc| self.chunker.chunk(doc)).collect();
        info!(documents = documents.len(), chunks = chunks.len(), "chunked corpus");

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings =
            embed_in_batches(self.provider.as_ref(), &texts, self.config.embed_batch_size).await?;

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry {
                text: chunk.text,
                embedding,
                metadata: chunk.metadata,
            })
            .collect();
        VectorIndex::build(entries)
    }

    /// Load every supported document under `directory` and index it.
    pub async fn index_directory(&self, directory: &Path) -> Result<VectorIndex> {
        let documents = load_documents(directory, &DEFAULT_EXTENSIONS)?;
        self.index_documents(&documents).await
    }

    /// Load a persisted index from `index_path`, or build one from
    /// `directory` and save it there if no usable snapshot exists.
    ///
    /// A snapshot whose dimension does not match the configured provider
    /// is treated as stale and rebuilt.
    pub async fn load_or_build(&self, directory: &Path, index_path: &Path) -> Result<VectorIndex> {
        if index_path.exists() {
            match VectorIndex::load(index_path) {
                Ok(index) if index.dimension() == self.provider.dimensions() => {
                    return Ok(index);
                }
                Ok(index) => {
                    info!(
                        snapshot = index.dimension(),
                        provider = self.provider.dimensions(),
                        "index snapshot dimension mismatch, rebuilding"
                    );
                }
                Err(e) => {
                    info!(error = %e, "failed to load index snapshot, rebuilding");
                }
            }
        }

        let index = self.index_directory(directory).await?;
        index.save(index_path)?;
        Ok(index)
    }

    /// Wrap a built index in a [`ContextRetriever`] sharing this
    /// pipeline's provider and context budget.
    pub fn retriever(&self, index: VectorIndex) -> ContextRetriever {
        ContextRetriever::new(self.provider.clone(), index, self.config.max_context_chars)
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }
}

/// Builder for [`KnowledgePipeline`].
#[derive(Default)]
pub struct KnowledgePipelineBuilder {
    config: Option<RagConfig>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    chunker: Option<Box<dyn Chunker>>,
}

impl KnowledgePipelineBuilder {
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Override the default [`RecursiveChunker`].
    pub fn chunker(mut self, chunker: Box<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// # Errors
    ///
    /// Returns [`RagError::Config`] if no embedding provider was set.
    pub fn build(self) -> Result<KnowledgePipeline> {
        let config = self.config.unwrap_or_default();
        let provider = self
            .provider
            .ok_or_else(|| RagError::Config("an embedding provider is required".to_string()))?;
        let chunker = self
            .chunker
            .unwrap_or_else(|| Box::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap)));

        Ok(KnowledgePipeline { config, provider, chunker })
    }
}
