//! # Etymology
//!
//! Generation half of Echoes: asks a language model for period-appropriate
//! usage examples of a word, era by era.
//!
//! ```text
//! generate(word, eras, n)
//!     │
//!     ├─► ResponseCache ── hit ──────────────┐
//!     │        │ miss                         │
//!     │        ▼                              ▼
//!     │   RetryingClient ─► OpenRouterClient  parse_response ─► era → [example]
//!     │        └──────────── raw text ───────►┘
//! ```

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod generator;
pub mod parser;
pub mod prompt;
pub mod retry;

pub use cache::{CacheKey, CacheStats, ResponseCache};
pub use client::{CompletionRequest, GenerationClient, OpenRouterClient, RetryingClient};
pub use config::{EtymologyConfig, parse_flag};
pub use error::{EtymologyError, Result};
pub use generator::{EvolutionGenerator, GeneratorSettings};
pub use parser::{EvolutionResult, parse_response};
pub use retry::{RetryPolicy, with_retry};
