//! Data types for documents, chunks, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A source document loaded from the corpus.
///
/// Documents exist only during index construction; after chunking they are
/// discarded and only their chunks (with inherited metadata) remain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier: the absolute source path.
    pub id: String,
    /// The raw text content.
    pub text: String,
    /// Key-value metadata (`source`, `filename`, `extension`, `size`).
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document with empty metadata (mainly for tests).
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: HashMap::new() }
    }
}

/// A bounded-length slice of a [`Document`], the unit of embedding and
/// retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier: `{document_id}_{chunk_index}`.
    pub id: String,
    /// The chunk text, at most `chunk_size` characters.
    pub text: String,
    /// Metadata inherited from the parent document plus `chunk_index`.
    pub metadata: HashMap<String, String>,
    /// The ID of the parent document.
    pub document_id: String,
}

/// One vector-index hit: chunk text and metadata with a similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The stored chunk text.
    pub text: String,
    /// The stored chunk metadata.
    pub metadata: HashMap<String, String>,
    /// Cosine similarity to the query (higher is more relevant).
    pub score: f32,
}
