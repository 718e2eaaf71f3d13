//! In-memory vector index with brute-force cosine search and optional disk
//! persistence.
//!
//! The index is a flat array of (text, embedding, metadata) entries built
//! once and read-only afterwards. Search scans every entry — exact
//! nearest-neighbor, no approximation — which is the contract the rest of
//! the pipeline relies on.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::document::SearchResult;
use crate::error::{RagError, Result};

/// One indexed chunk: its text, embedding, and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexEntry {
    /// The chunk text.
    pub text: String,
    /// The chunk's embedding vector.
    pub embedding: Vec<f32>,
    /// The chunk's metadata.
    pub metadata: HashMap<String, String>,
}

/// An append-only nearest-neighbor index over fixed-dimension vectors.
///
/// Constructed via [`build`](VectorIndex::build) or
/// [`load`](VectorIndex::load); there is no way to hold an unbuilt index,
/// so "query before build" is unrepresentable. Entries are owned
/// exclusively by the index and never mutated after construction, making
/// the index safe for concurrent read access.
#[derive(Debug, Serialize, Deserialize)]
pub struct VectorIndex {
    dimension: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Build an index from entries.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyIndex`] if `entries` is empty
    /// - [`RagError::DimensionMismatch`] if the entries do not all share
    ///   one embedding dimension
    pub fn build(entries: Vec<IndexEntry>) -> Result<Self> {
        let Some(first) = entries.first() else {
            return Err(RagError::EmptyIndex);
        };
        let dimension = first.embedding.len();
        if dimension == 0 {
            return Err(RagError::DimensionMismatch { expected: 1, actual: 0 });
        }
        for entry in &entries {
            if entry.embedding.len() != dimension {
                return Err(RagError::DimensionMismatch {
                    expected: dimension,
                    actual: entry.embedding.len(),
                });
            }
        }

        info!(entries = entries.len(), dimension, "built vector index");
        Ok(Self { dimension, entries })
    }

    /// The shared embedding dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of indexed entries (always at least 1).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Search for the `top_k` entries most similar to `query`.
    ///
    /// Results are ordered by descending cosine similarity; ties keep
    /// insertion order (the sort is stable). If fewer than `top_k` entries
    /// exist, all of them are returned.
    ///
    /// # Errors
    ///
    /// - [`RagError::InvalidTopK`] if `top_k == 0`
    /// - [`RagError::DimensionMismatch`] if `query` has the wrong dimension
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        if top_k == 0 {
            return Err(RagError::InvalidTopK);
        }
        if query.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<SearchResult> = self
            .entries
            .iter()
            .map(|entry| SearchResult {
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
                score: cosine_similarity(&entry.embedding, query),
            })
            .collect();

        // Stable sort keeps insertion order for equal scores.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Serialize the full entry set to `path` as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Persist`] on I/O or serialization failure.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|e| RagError::Persist(format!("failed to create {}: {e}", path.display())))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .map_err(|e| RagError::Persist(format!("failed to serialize index: {e}")))?;
        info!(path = %path.display(), entries = self.entries.len(), "saved vector index");
        Ok(())
    }

    /// Load a previously saved index from `path`.
    ///
    /// The snapshot is revalidated on the way in, so a corrupt or empty
    /// file fails here rather than at query time.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Persist`] on I/O or parse failure, plus the
    /// validation errors of [`build`](VectorIndex::build).
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| RagError::Persist(format!("failed to open {}: {e}", path.display())))?;
        let snapshot: VectorIndex = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| RagError::Persist(format!("failed to parse index: {e}")))?;

        let loaded = Self::build(snapshot.entries)?;
        info!(path = %path.display(), entries = loaded.entries.len(), "loaded vector index");
        Ok(loaded)
    }
}

/// Cosine similarity of two equal-length vectors; 0.0 when either has zero
/// magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
