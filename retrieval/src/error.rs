//! Error types for era storage and timelines.

use thiserror::Error;

/// Result type alias for retrieval operations.
pub type Result<T> = std::result::Result<T, RetrievalError>;

/// Errors that can occur while building, storing or querying era records.
///
/// Missing concepts and eras are not errors; see
/// [`EraLookup`](crate::store::EraLookup).
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Embedding error.
    #[error("embedding error: {0}")]
    Embedding(#[from] echoes_embeddings::EmbeddingError),

    /// Generation error.
    #[error("generation error: {0}")]
    Etymology(#[from] echoes_etymology::EtymologyError),

    /// Rejected argument (bad label, out-of-range count).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
