//! # Embeddings
//!
//! Vector side of the Echoes pipeline: turning example sentences into
//! embeddings, ranking stored examples against a query, and measuring how far
//! an era's average meaning moved from the era before it.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Embeddings System                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  EmbeddingProvider ──► Embedding ──► top_similar (per era)     │
//! │       │                                   │                     │
//! │       ▼                                   ▼                     │
//! │  HTTP embeddings API             centroid ──► drift             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod drift;
pub mod error;
pub mod provider;
pub mod similarity;

pub use drift::{centroid, drift, try_drift};
pub use error::{EmbeddingError, Result};
pub use provider::{EmbeddingProvider, EmbeddingRequest, EmbeddingResponse, HttpEmbeddingProvider};
pub use similarity::{Embedded, ScoredItem, cosine_similarity, top_similar};

/// A dense vector embedding.
pub type Embedding = Vec<f32>;
