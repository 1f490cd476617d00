//! Configuration for evolution generation.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EtymologyError, Result};
use crate::retry::RetryPolicy;

/// Configuration for the OpenRouter client and the evolution generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EtymologyConfig {
    /// OpenRouter API key.
    pub api_key: Option<String>,

    /// Chat completions base URL.
    pub base_url: String,

    /// Model used to synthesize examples.
    pub model: String,

    /// Sent as `HTTP-Referer` for OpenRouter attribution.
    pub site_url: String,

    /// Sent as `X-Title` for OpenRouter attribution.
    pub app_name: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Completion token budget.
    pub max_tokens: u32,

    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,

    /// Total attempts per generation, including the first.
    pub max_attempts: u32,

    /// Lower bound of the retry backoff, in seconds.
    pub backoff_min_secs: u64,

    /// Upper bound of the retry backoff, in seconds.
    pub backoff_max_secs: u64,

    /// Whether raw responses are memoized.
    pub cache_enabled: bool,

    /// Maximum number of memoized responses.
    pub cache_capacity: usize,

    /// Largest accepted `num_examples`.
    pub max_examples_per_era: usize,

    /// `num_examples` used when the caller does not pick one.
    pub default_examples_per_era: usize,
}

impl Default for EtymologyConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "qwen/qwen-2.5-72b-instruct".to_string(),
            site_url: "https://echoes-app.local".to_string(),
            app_name: "Echoes-Backend".to_string(),
            temperature: 0.7,
            max_tokens: 2000,
            timeout_secs: 60,
            max_attempts: 3,
            backoff_min_secs: 2,
            backoff_max_secs: 10,
            cache_enabled: true,
            cache_capacity: 100,
            max_examples_per_era: 20,
            default_examples_per_era: 5,
        }
    }
}

impl EtymologyConfig {
    /// Build a configuration from the process environment.
    ///
    /// Unset variables keep their defaults. `OPENROUTER_API_KEY` is required
    /// and must look like an OpenRouter key.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| EtymologyError::Config("OPENROUTER_API_KEY is not set".to_string()))?;
        validate_api_key(&api_key)?;
        config.api_key = Some(api_key);

        if let Ok(model) = std::env::var("OPENROUTER_MODEL") {
            config.model = model;
        }
        if let Ok(url) = std::env::var("OPENROUTER_BASE_URL") {
            config.base_url = url;
        }
        if let Ok(url) = std::env::var("OPENROUTER_SITE_URL") {
            config.site_url = url;
        }
        if let Ok(name) = std::env::var("OPENROUTER_APP_NAME") {
            config.app_name = name;
        }
        if let Some(v) = env_parse("LLM_TEMPERATURE")? {
            config.temperature = v;
        }
        if let Some(v) = env_parse("LLM_MAX_TOKENS")? {
            config.max_tokens = v;
        }
        if let Some(v) = env_parse("LLM_TIMEOUT")? {
            config.timeout_secs = v;
        }
        if let Some(v) = env_parse("LLM_MAX_RETRIES")? {
            config.max_attempts = v;
        }
        if let Some(v) = env_flag("CACHE_LLM_RESPONSES")? {
            config.cache_enabled = v;
        }
        if let Some(v) = env_parse("LLM_CACHE_CAPACITY")? {
            config.cache_capacity = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check value ranges that would otherwise fail later at request time.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(EtymologyError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.backoff_min_secs > self.backoff_max_secs {
            return Err(EtymologyError::Config(format!(
                "backoff bounds are inverted: {}s > {}s",
                self.backoff_min_secs, self.backoff_max_secs
            )));
        }
        if self.max_examples_per_era == 0 {
            return Err(EtymologyError::Config(
                "max_examples_per_era must be at least 1".to_string(),
            ));
        }
        if !(1..=self.max_examples_per_era).contains(&self.default_examples_per_era) {
            return Err(EtymologyError::Config(format!(
                "default_examples_per_era must be between 1 and {}",
                self.max_examples_per_era
            )));
        }
        Ok(())
    }

    /// Per-attempt timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry policy described by this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_secs(self.backoff_min_secs),
            Duration::from_secs(self.backoff_max_secs),
        )
    }
}

/// Reject keys that are obviously not OpenRouter keys.
pub fn validate_api_key(key: &str) -> Result<()> {
    if key.len() < 10 {
        return Err(EtymologyError::Config("Invalid OpenRouter API key".to_string()));
    }
    if !key.starts_with("sk-or-v1-") {
        return Err(EtymologyError::Config(
            "OpenRouter API key should start with 'sk-or-v1-'".to_string(),
        ));
    }
    Ok(())
}

/// Parse a boolean flag the way settings files write them: `1/0`,
/// `true/false`, `yes/no` or `on/off`, in any case.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_flag(name: &str) -> Result<Option<bool>> {
    match std::env::var(name) {
        Ok(raw) => parse_flag(&raw)
            .map(Some)
            .ok_or_else(|| EtymologyError::Config(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| EtymologyError::Config(format!("{name} has an invalid value: {raw}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_match_openrouter_setup() {
        let config = EtymologyConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.max_examples_per_era, 20);
        assert!(config.cache_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_api_key_validation() {
        assert!(validate_api_key("sk-or-v1-abcdef").is_ok());
        assert!(validate_api_key("short").is_err());
        assert!(validate_api_key("sk-proj-0123456789").is_err());
    }

    #[test]
    fn test_flags_accept_settings_spellings() {
        for raw in ["1", "true", "True", "YES", " on "] {
            assert_eq!(parse_flag(raw), Some(true), "{raw:?}");
        }
        for raw in ["0", "false", "FALSE", "No", "off"] {
            assert_eq!(parse_flag(raw), Some(false), "{raw:?}");
        }
        assert_eq!(parse_flag("maybe"), None);
        assert_eq!(parse_flag(""), None);
    }

    #[test]
    fn test_inverted_backoff_is_rejected() {
        let config = EtymologyConfig {
            backoff_min_secs: 20,
            backoff_max_secs: 10,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(EtymologyError::Config(_))));
    }

    #[test]
    fn test_partial_config_deserializes_with_defaults() {
        let config: EtymologyConfig =
            serde_json::from_str(r#"{"model": "openai/gpt-4o-mini", "cache_enabled": false}"#)
                .unwrap();
        assert_eq!(config.model, "openai/gpt-4o-mini");
        assert!(!config.cache_enabled);
        assert_eq!(config.max_tokens, 2000);
    }
}
