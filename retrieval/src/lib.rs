//! # Retrieval
//!
//! Storage and query side of Echoes. Example sentences for a concept are
//! embedded and stored per era under `<root>/<concept>/<era>.json`; timelines
//! rank each era's examples against a query and chain centroid drift from
//! one era to the next.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  EvolutionPipeline        CorpusBuilder                         │
//! │   (LLM examples)           (<era>_<concept>.csv)                │
//! │          │                       │                              │
//! │          └──────────┬────────────┘                              │
//! │                     ▼                                           │
//! │           EmbeddingStoreWriter ──► EraStore (JSON per era)      │
//! │                                        │                        │
//! │                                        ▼                        │
//! │                               TimelineBuilder                   │
//! │                       (top_similar + centroid drift)            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use echoes_retrieval::{EchoesConfig, EraStore, TimelineBuilder};
//!
//! let config = EchoesConfig::from_env(false)?;
//! let provider = Arc::new(config.embedding.provider());
//! let builder = TimelineBuilder::new(EraStore::new(&config.embeddings_dir), provider);
//!
//! let timeline = builder.query_timeline("privacy", config.default_top_n).await?;
//! ```

pub mod config;
pub mod corpus;
pub mod error;
pub mod pipeline;
pub mod record;
pub mod store;
pub mod timeline;
pub mod writer;

pub use config::{EchoesConfig, EmbeddingConfig};
pub use corpus::CorpusBuilder;
pub use error::{Result, RetrievalError};
pub use pipeline::{BuildReport, EvolutionPipeline};
pub use record::{EraMeta, EraRecord, ExampleItem, InvalidItem, validate_item};
pub use store::{EraLookup, EraStore, normalize_concept, validate_label};
pub use timeline::{EraView, Timeline, TimelineBuilder, TimelineEntry, TimelineError};
pub use writer::{EmbeddingStoreWriter, WrittenEra};

// Re-export from dependencies for convenience
pub use echoes_embeddings::{EmbeddingProvider, ScoredItem};
pub use echoes_etymology::{EtymologyConfig, EvolutionGenerator, EvolutionResult};
