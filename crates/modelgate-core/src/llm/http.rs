//! Shared HTTP plumbing for concrete providers

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client as HttpClient;

use super::factory::ProviderKind;
use super::retry::RetryPolicy;
use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::routing::ModelRegistry;

/// Everything a concrete provider needs, resolved up front
///
/// Built from an explicit provider kind so constructing an alternate
/// provider never touches shared configuration.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub base_url: String,
    pub api_key: Option<String>,
    pub default_max_tokens: u32,
    pub default_temperature: f32,
    pub default_top_p: f32,
    pub retry: RetryPolicy,
    pub registry: Arc<ModelRegistry>,
    pub(crate) http: HttpClient,
}

impl ProviderSettings {
    /// Resolve settings for `kind` from configuration
    pub fn from_config(
        kind: ProviderKind,
        config: &LlmConfig,
        api_key: Option<String>,
        registry: Arc<ModelRegistry>,
    ) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(Error::NetworkError)?;

        Ok(Self {
            kind,
            base_url: kind.base_url(config),
            api_key,
            default_max_tokens: config.default_max_tokens,
            default_temperature: config.default_temperature,
            default_top_p: config.default_top_p,
            retry: config.retry_policy(),
            registry,
            http,
        })
    }

    /// Point the provider at a different endpoint
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn max_tokens_or_default(&self, max_tokens: u32) -> u32 {
        if max_tokens == 0 {
            self.default_max_tokens
        } else {
            max_tokens
        }
    }

    pub(crate) fn temperature_or_default(&self, temperature: Option<f32>) -> f32 {
        temperature.unwrap_or(self.default_temperature)
    }

    pub(crate) fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// Turn a non-success HTTP response into an error
pub(crate) async fn error_for_response<T>(
    kind: ProviderKind,
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(error_for_status(kind, status.as_u16(), &body))
}

pub(crate) fn error_for_status(kind: ProviderKind, status: u16, body: &str) -> Error {
    match status {
        401 => Error::LLMError(match kind.api_key_env() {
            Some(var) => format!("Unauthorized: Invalid API key. Check the {} environment variable.", var),
            None => "Unauthorized".to_string(),
        }),
        429 => Error::RateLimited(extract_retry_after(body).unwrap_or(60)),
        400 => Error::LLMError(format!("Bad request: {}", body)),
        402 => Error::LLMError(format!("Payment required: insufficient credits on {}", kind)),
        403 => Error::LLMError(format!("Forbidden: {}", body)),
        404 => Error::LLMError(format!(
            "Model not found or endpoint unavailable: {}",
            body
        )),
        500..=599 => Error::LLMError(format!("Server error ({}): {}", status, body)),
        _ => Error::LLMError(format!("HTTP error {}: {}", status, body)),
    }
}

/// Extract retry-after value from an error body
fn extract_retry_after(body: &str) -> Option<u64> {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(retry_after) = json.get("retry_after").and_then(|v| v.as_u64()) {
            return Some(retry_after);
        }
        if let Some(error) = json.get("error")
            && let Some(retry_after) = error.get("retry_after").and_then(|v| v.as_u64())
        {
            return Some(retry_after);
        }
    }
    None
}
