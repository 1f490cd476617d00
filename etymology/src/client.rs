//! Generation clients.
//!
//! The language model is an external service reached through
//! [`GenerationClient`]. [`OpenRouterClient`] issues exactly one chat
//! completion per call; [`RetryingClient`] wraps any client with a
//! [`RetryPolicy`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::EtymologyConfig;
use crate::error::{EtymologyError, Result};
use crate::retry::{RetryPolicy, with_retry};

/// One completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System message.
    pub system_prompt: String,

    /// User message.
    pub user_prompt: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Completion token budget.
    pub max_tokens: u32,

    /// Bound on this single attempt.
    pub timeout: Duration,
}

/// Trait for language model clients.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Model identifier reported alongside generated data.
    fn model(&self) -> &str;

    /// Run a completion and return the raw response text.
    ///
    /// Fails with [`EtymologyError::Upstream`] or [`EtymologyError::Timeout`].
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}

/// Client for the OpenRouter chat completions API.
pub struct OpenRouterClient {
    api_key: String,
    base_url: String,
    model: String,
    site_url: String,
    app_name: String,
    client: reqwest::Client,
}

impl OpenRouterClient {
    /// Create a client from configuration.
    pub fn new(config: &EtymologyConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| EtymologyError::Config("OpenRouter API key is not set".to_string()))?;

        let client = Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            site_url: config.site_url.clone(),
            app_name: config.app_name.clone(),
            client: reqwest::Client::new(),
        };

        info!("Initialized OpenRouter with model: {}", client.model);
        Ok(client)
    }
}

#[async_trait]
impl GenerationClient for OpenRouterClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_prompt}
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens
        });

        debug!("Calling OpenRouter model {}", self.model);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("HTTP-Referer", &self.site_url)
            .header("X-Title", &self.app_name)
            .timeout(request.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, request.timeout))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("OpenRouter API error ({status}): {error_text}");
            return Err(EtymologyError::Upstream(format!(
                "API call failed ({status}): {error_text}"
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| transport_error(e, request.timeout))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(EtymologyError::Upstream(
                "Empty response from OpenRouter".to_string(),
            ));
        }

        Ok(content)
    }
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> EtymologyError {
    if e.is_timeout() {
        error!("OpenRouter request timed out: {e}");
        EtymologyError::Timeout(timeout)
    } else {
        error!("OpenRouter API error: {e}");
        EtymologyError::Upstream(format!("API call failed: {e}"))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// A client that retries another client according to a [`RetryPolicy`].
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
}

impl<C: GenerationClient> RetryingClient<C> {
    /// Wrap `inner` with `policy`.
    pub fn new(inner: C, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The policy in effect.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<C: GenerationClient> GenerationClient for RetryingClient<C> {
    fn model(&self) -> &str {
        self.inner.model()
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        with_retry(&self.policy, || self.inner.complete(request.clone())).await
    }
}
