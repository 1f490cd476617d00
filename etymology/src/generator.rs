//! Evolution generator.
//!
//! Entry point for obtaining synthetic historical usage data for a word:
//! validates the request, consults the response cache, calls the model on a
//! miss, and parses the answer.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::cache::{CacheKey, ResponseCache};
use crate::client::{CompletionRequest, GenerationClient, OpenRouterClient, RetryingClient};
use crate::config::EtymologyConfig;
use crate::error::{EtymologyError, Result};
use crate::parser::{EvolutionResult, parse_response};
use crate::prompt::{SYSTEM_PROMPT, build_prompt};

/// Request-shaping settings for the generator.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    /// Largest accepted `num_examples`.
    pub max_examples_per_era: usize,

    /// Sampling temperature.
    pub temperature: f32,

    /// Completion token budget.
    pub max_tokens: u32,

    /// Per-attempt timeout.
    pub timeout: Duration,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self::from(&EtymologyConfig::default())
    }
}

impl From<&EtymologyConfig> for GeneratorSettings {
    fn from(config: &EtymologyConfig) -> Self {
        Self {
            max_examples_per_era: config.max_examples_per_era,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: config.timeout(),
        }
    }
}

/// Validated generation arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Normalized {
    word: String,
    eras: Vec<String>,
    num_examples: usize,
}

/// Produces per-era example sentences for a word.
pub struct EvolutionGenerator {
    client: Arc<dyn GenerationClient>,
    cache: Option<Arc<ResponseCache>>,
    settings: GeneratorSettings,
}

impl EvolutionGenerator {
    /// Create a generator. Pass `None` as `cache` to always call the model.
    pub fn new(
        client: Arc<dyn GenerationClient>,
        cache: Option<Arc<ResponseCache>>,
        settings: GeneratorSettings,
    ) -> Self {
        Self {
            client,
            cache,
            settings,
        }
    }

    /// Wire up an OpenRouter client, retry policy and cache from configuration.
    pub fn from_config(config: &EtymologyConfig) -> Result<Self> {
        config.validate()?;
        let client = RetryingClient::new(OpenRouterClient::new(config)?, config.retry_policy());
        let cache = config
            .cache_enabled
            .then(|| Arc::new(ResponseCache::new(config.cache_capacity)));

        info!(
            "Response caching {}",
            if cache.is_some() { "enabled" } else { "disabled" }
        );

        Ok(Self::new(Arc::new(client), cache, GeneratorSettings::from(config)))
    }

    /// Model identifier of the underlying client.
    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// The response cache, if caching is enabled.
    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    /// Generate examples of `word` for each era.
    ///
    /// Eras the model left out are logged and simply absent from the result.
    pub async fn generate(
        &self,
        word: &str,
        eras: &[String],
        num_examples: usize,
    ) -> Result<EvolutionResult> {
        let request = self.normalize(word, eras, num_examples)?;

        info!(
            "Generating evolution for '{}' across {} eras ({} examples each)",
            request.word,
            request.eras.len(),
            request.num_examples
        );

        let result = self.generate_normalized(&request).await.inspect_err(|e| {
            error!("Failed to generate evolution for '{}': {e}", request.word);
        })?;

        let returned: HashSet<&str> = result.keys().map(String::as_str).collect();
        let missing: Vec<&str> = request
            .eras
            .iter()
            .map(String::as_str)
            .filter(|era| !returned.contains(era))
            .collect();
        if !missing.is_empty() {
            warn!("Missing data for eras: {}", missing.join(", "));
        }

        info!(
            "Successfully generated {} examples for '{}'",
            result.values().map(Vec::len).sum::<usize>(),
            request.word
        );

        Ok(result)
    }

    async fn generate_normalized(&self, request: &Normalized) -> Result<EvolutionResult> {
        let Some(cache) = &self.cache else {
            let raw = self.call_model(request).await?;
            return parse_response(&raw);
        };

        let key = CacheKey::new(&request.word, &request.eras, request.num_examples);
        if let Some(raw) = cache.get(&key).await {
            return parse_response(&raw);
        }

        let raw = self.call_model(request).await?;
        let result = parse_response(&raw)?;
        cache.put(key, raw).await;
        Ok(result)
    }

    async fn call_model(&self, request: &Normalized) -> Result<String> {
        self.client
            .complete(CompletionRequest {
                system_prompt: SYSTEM_PROMPT.to_string(),
                user_prompt: build_prompt(&request.word, &request.eras, request.num_examples),
                temperature: self.settings.temperature,
                max_tokens: self.settings.max_tokens,
                timeout: self.settings.timeout,
            })
            .await
    }

    fn normalize(&self, word: &str, eras: &[String], num_examples: usize) -> Result<Normalized> {
        let word = word.trim().to_lowercase();
        if word.is_empty() {
            return Err(EtymologyError::InvalidInput("Word cannot be empty".to_string()));
        }

        if eras.is_empty() {
            return Err(EtymologyError::InvalidInput(
                "Must provide at least one era".to_string(),
            ));
        }

        let max = self.settings.max_examples_per_era;
        if !(1..=max).contains(&num_examples) {
            return Err(EtymologyError::InvalidInput(format!(
                "num_examples must be between 1 and {max}"
            )));
        }

        let mut normalized_eras = Vec::with_capacity(eras.len());
        for era in eras {
            let trimmed = era.trim();
            if trimmed.is_empty() {
                return Err(EtymologyError::InvalidInput(format!("Invalid era: '{era}'")));
            }
            normalized_eras.push(trimmed.to_string());
        }

        Ok(Normalized {
            word,
            eras: normalized_eras,
            num_examples,
        })
    }
}
