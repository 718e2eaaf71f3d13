//! Error types for the retrieval pipeline.

use thiserror::Error;

/// Errors that can occur while building or querying the retrieval pipeline.
#[derive(Debug, Error)]
pub enum RagError {
    /// No usable documents survived the corpus scan.
    #[error("no valid documents found in corpus directory: {directory}")]
    EmptyCorpus {
        /// The directory that was scanned.
        directory: String,
    },

    /// A file or directory could not be read or parsed.
    #[error("loader error: {0}")]
    Loader(String),

    /// The embedding backend failed or violated its contract.
    #[error("embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector's dimension did not match the index dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index was built with.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// An index cannot be built from zero entries.
    #[error("cannot build a vector index from zero entries")]
    EmptyIndex,

    /// `top_k` must be at least 1 for a search.
    #[error("top_k must be greater than zero")]
    InvalidTopK,

    /// A configuration validation error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Saving or loading a persisted index failed.
    #[error("persistence error: {0}")]
    Persist(String),
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
