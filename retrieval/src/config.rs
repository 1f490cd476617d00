//! Top-level configuration for the Echoes pipeline.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use echoes_embeddings::HttpEmbeddingProvider;
use echoes_etymology::{EtymologyConfig, parse_flag};
use serde::{Deserialize, Serialize};

use crate::error::{Result, RetrievalError};

/// Configuration for storage, retrieval and both model collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoesConfig {
    /// Root of the `<concept>/<era>.json` tree.
    pub embeddings_dir: PathBuf,

    /// Directory holding `<era>_<concept>.csv` corpus files.
    pub data_dir: PathBuf,

    /// Top items per era when the caller does not say.
    pub default_top_n: usize,

    /// Largest accepted top-N.
    pub max_top_n: usize,

    /// Top items for a single era view when the caller does not say.
    pub era_default_top_n: usize,

    /// Largest accepted top-N for a single era view.
    pub era_max_top_n: usize,

    /// Whether the language model may be used at all.
    pub use_llm: bool,

    /// Embedding provider configuration.
    pub embedding: EmbeddingConfig,

    /// Evolution generation configuration.
    pub etymology: EtymologyConfig,
}

impl Default for EchoesConfig {
    fn default() -> Self {
        Self {
            embeddings_dir: PathBuf::from("embeddings"),
            data_dir: PathBuf::from("data"),
            default_top_n: 6,
            max_top_n: 50,
            era_default_top_n: 10,
            era_max_top_n: 100,
            use_llm: true,
            embedding: EmbeddingConfig::default(),
            etymology: EtymologyConfig::default(),
        }
    }
}

impl EchoesConfig {
    /// Build a configuration from the process environment.
    ///
    /// The OpenRouter section is only loaded when `require_llm` is set, so
    /// read-only commands work without an API key. With `require_llm` set,
    /// `USE_LLM_ETYMOLOGY=false` is a configuration error.
    pub fn from_env(require_llm: bool) -> Result<Self> {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("EMBEDDINGS_DIR") {
            config.embeddings_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(v) = env_parse("DEFAULT_TOP_N")? {
            config.default_top_n = v;
        }
        if let Some(v) = env_parse("MAX_TOP_N")? {
            config.max_top_n = v;
        }
        if let Some(v) = env_flag("USE_LLM_ETYMOLOGY")? {
            config.use_llm = v;
        }

        config.embedding = EmbeddingConfig::from_env()?;
        if require_llm {
            config.ensure_llm_enabled()?;
            config.etymology = EtymologyConfig::from_env()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.max_top_n == 0 {
            return Err(RetrievalError::Config("max_top_n must be at least 1".to_string()));
        }
        if !(1..=self.max_top_n).contains(&self.default_top_n) {
            return Err(RetrievalError::Config(format!(
                "default_top_n must be between 1 and {}",
                self.max_top_n
            )));
        }
        if !(1..=self.era_max_top_n).contains(&self.era_default_top_n) {
            return Err(RetrievalError::Config(format!(
                "era_default_top_n must be between 1 and {}",
                self.era_max_top_n
            )));
        }
        Ok(())
    }

    /// Fail when generation has been switched off.
    pub fn ensure_llm_enabled(&self) -> Result<()> {
        if self.use_llm {
            Ok(())
        } else {
            Err(RetrievalError::Config(
                "LLM etymology is disabled in configuration".to_string(),
            ))
        }
    }

    /// Resolve a caller-supplied timeline top-N against the configured bounds.
    pub fn top_n(&self, requested: Option<usize>) -> Result<usize> {
        resolve_top_n(requested, self.default_top_n, self.max_top_n)
    }

    /// Resolve a caller-supplied era-view top-N against its bounds.
    pub fn era_top_n(&self, requested: Option<usize>) -> Result<usize> {
        resolve_top_n(requested, self.era_default_top_n, self.era_max_top_n)
    }
}

fn resolve_top_n(requested: Option<usize>, default: usize, max: usize) -> Result<usize> {
    match requested {
        None => Ok(default),
        Some(n) if (1..=max).contains(&n) => Ok(n),
        Some(n) => Err(RetrievalError::InvalidInput(format!(
            "top_n must be between 1 and {max}, got {n}"
        ))),
    }
}

/// Configuration for the OpenAI-compatible embeddings endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Endpoint base URL, without `/embeddings`.
    pub base_url: String,

    /// Embedding model name.
    pub model: String,

    /// Optional bearer token.
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: HttpEmbeddingProvider::DEFAULT_BASE_URL.to_string(),
            model: HttpEmbeddingProvider::DEFAULT_MODEL.to_string(),
            api_key: None,
            timeout_secs: 60,
        }
    }
}

impl EmbeddingConfig {
    fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var("EMBEDDING_BASE_URL") {
            config.base_url = url;
        }
        if let Some(model) = model_from(|name| std::env::var(name).ok()) {
            config.model = model;
        }
        if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
            config.api_key = Some(key);
        }
        if let Some(v) = env_parse("EMBEDDING_TIMEOUT")? {
            config.timeout_secs = v;
        }
        Ok(config)
    }

    /// Construct the HTTP provider this configuration describes.
    pub fn provider(&self) -> HttpEmbeddingProvider {
        let provider = HttpEmbeddingProvider::new()
            .with_base_url(&self.base_url)
            .with_model(&self.model)
            .with_timeout(Duration::from_secs(self.timeout_secs));
        match &self.api_key {
            Some(key) => provider.with_api_key(key),
            None => provider,
        }
    }
}

/// Embedding model name; SENTENCE_TRANSFORMER_MODEL is the older variable.
fn model_from(var: impl Fn(&str) -> Option<String>) -> Option<String> {
    var("EMBEDDING_MODEL").or_else(|| var("SENTENCE_TRANSFORMER_MODEL"))
}

fn env_flag(name: &str) -> Result<Option<bool>> {
    match std::env::var(name) {
        Ok(raw) => parse_flag(&raw)
            .map(Some)
            .ok_or_else(|| RetrievalError::Config(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| RetrievalError::Config(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}
