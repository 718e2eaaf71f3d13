//! # pka-rag
//!
//! The retrieval pipeline behind the personal knowledge agent: corpus
//! loading, document chunking, embedding, an in-memory vector index with
//! disk persistence, and query-time context retrieval.
//!
//! Data flows one way at setup time:
//!
//! ```text
//! directory ──load──▶ Document ──chunk──▶ Chunk ──embed──▶ VectorIndex
//! ```
//!
//! and at query time:
//!
//! ```text
//! query ──embed──▶ VectorIndex::search ──truncate──▶ context strings
//! ```
//!
//! The index is built once per corpus and read-only afterwards; it is safe
//! to share behind an `Arc` across concurrent requests.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use pka_rag::{KnowledgePipeline, RagConfig};
//!
//! let pipeline = KnowledgePipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(provider))
//!     .build()?;
//!
//! let index = pipeline.index_directory("data/".as_ref()).await?;
//! let retriever = pipeline.retriever(index);
//! let context = retriever.retrieve("what is a vector index?", 3).await?;
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod loader;
pub mod openai;
pub mod pipeline;
pub mod retriever;

pub use chunking::{Chunker, RecursiveChunker, WindowChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::{EmbeddingProvider, embed_in_batches};
pub use error::{RagError, Result};
pub use index::{IndexEntry, VectorIndex};
pub use loader::{DEFAULT_EXTENSIONS, load_documents, load_single_document};
pub use openai::{OpenAIEmbeddingConfig, OpenAIEmbeddingProvider};
pub use pipeline::{KnowledgePipeline, KnowledgePipelineBuilder};
pub use retriever::ContextRetriever;
