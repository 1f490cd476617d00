//! Error types for evolution generation.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for generation operations.
pub type Result<T> = std::result::Result<T, EtymologyError>;

/// Errors that can occur while generating word evolution data.
#[derive(Error, Debug)]
pub enum EtymologyError {
    /// Caller supplied an unusable word, era list or example count.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The language model API failed or returned nothing usable.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// The language model did not answer within the per-attempt timeout.
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The model answered, but not with an era → examples document.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl EtymologyError {
    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Timeout(_))
    }
}
