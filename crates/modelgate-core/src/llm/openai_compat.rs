//! OpenAI-compatible chat completions provider
//!
//! Serves OpenRouter, OpenAI, Gemini (through its OpenAI-compatible
//! endpoint), xAI Grok and LM Studio.

use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use super::factory::ProviderKind;
use super::http::{ProviderSettings, error_for_response};
use super::provider::{Provider, price_usage};
use super::retry::RetryPolicy;
use super::types::{ChatRequest, ChatResponse, LlmResponse, Message};
use crate::error::{Error, Result};

/// Provider speaking the `/chat/completions` wire format
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    settings: ProviderSettings,
}

impl OpenAiCompatibleProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }

    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    fn request(&self, model_id: &str, messages: &[Message], max_tokens: u32, temperature: Option<f32>) -> ChatRequest {
        ChatRequest::new(
            self.settings.kind.wire_model_id(model_id),
            messages.to_vec(),
        )
        .with_temperature(self.settings.temperature_or_default(temperature))
        .with_top_p(self.settings.default_top_p)
        .with_max_tokens(self.settings.max_tokens_or_default(max_tokens))
    }
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        self.settings.kind.as_str()
    }

    async fn call(
        &self,
        model_id: &str,
        messages: &[Message],
        max_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let kind = self.settings.kind;
        let started = Instant::now();
        let request = self.request(model_id, messages, max_tokens, temperature);

        debug!(
            provider = %kind,
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let mut builder = self
            .settings
            .http
            .post(self.settings.url("/chat/completions"))
            .json(&request);

        match self.settings.api_key.as_deref().filter(|k| !k.is_empty()) {
            Some(key) => builder = builder.bearer_auth(key),
            None if !kind.is_local() => {
                return Err(Error::ProviderUnavailable(kind.to_string()));
            }
            None => {}
        }
        if kind == ProviderKind::OpenRouter {
            builder = builder.header("X-Title", "Modelgate");
        }

        let response = builder.send().await.map_err(Error::NetworkError)?;
        if !response.status().is_success() {
            return error_for_response(kind, response).await;
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMError(format!("Failed to parse response: {}", e)))?;
        let (model, content, usage, finish_reason) = chat
            .into_parts()
            .ok_or_else(|| Error::LLMError("Empty response from API".to_string()))?;

        let cost_usd = if kind.is_local() {
            0.0
        } else {
            price_usage(&self.settings.registry, model_id, &usage)
        };

        Ok(LlmResponse {
            content,
            model: if model.is_empty() {
                model_id.to_string()
            } else {
                model
            },
            usage,
            cost_usd,
            response_time: started.elapsed(),
            finish_reason,
        })
    }

    async fn is_available(&self) -> bool {
        if self.settings.kind.is_local() {
            return match self.settings.http.get(self.settings.url("/models")).send().await {
                Ok(response) => response.status().is_success(),
                Err(e) => {
                    debug!(provider = %self.settings.kind, error = %e, "Liveness check failed");
                    false
                }
            };
        }
        self.settings.has_api_key()
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.settings.retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::llm::FinishReason;
    use crate::routing::ModelRegistry;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(kind: ProviderKind, key: Option<&str>, url: &str) -> OpenAiCompatibleProvider {
        let settings = ProviderSettings::from_config(
            kind,
            &LlmConfig::default(),
            key.map(String::from),
            Arc::new(ModelRegistry::with_defaults()),
        )
        .unwrap()
        .with_base_url(url)
        .with_retry(RetryPolicy::new(1, Duration::ZERO));
        OpenAiCompatibleProvider::new(settings)
    }

    fn completion(model: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1677652288,
            "model": model,
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello there"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 1000, "completion_tokens": 1000, "total_tokens": 2000}
        })
    }

    #[tokio::test]
    async fn test_call_prices_from_catalog() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion("anthropic/claude-3-sonnet")),
            )
            .mount(&server)
            .await;

        let provider = provider(ProviderKind::OpenRouter, Some("test-key"), &server.uri());
        let response = provider
            .call("anthropic/claude-3-sonnet", &[Message::user("hi")], 100, Some(0.5))
            .await
            .unwrap();

        assert_eq!(response.content, "Hello there");
        assert_eq!(response.usage.total_tokens, 2000);
        assert_eq!(response.finish_reason, FinishReason::Stop);
        // 1000 tokens at $3/M + 1000 tokens at $15/M
        assert!((response.cost_usd - 0.018).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_local_server_is_free() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("local-model")))
            .mount(&server)
            .await;

        let provider = provider(ProviderKind::LmStudio, None, &server.uri());
        let response = provider
            .call("local-model", &[Message::user("hi")], 0, None)
            .await
            .unwrap();
        assert_eq!(response.cost_usd, 0.0);
    }

    #[tokio::test]
    async fn test_explicit_zero_temperature_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(json!({"temperature": 0.0})))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("local-model")))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider(ProviderKind::LmStudio, None, &server.uri());
        provider
            .call("local-model", &[Message::user("hi")], 0, Some(0.0))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({"retry_after": 5})))
            .mount(&server)
            .await;

        let provider = provider(ProviderKind::OpenAi, Some("k"), &server.uri());
        let err = provider
            .call("openai/gpt-4-turbo", &[Message::user("hi")], 10, Some(0.5))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RateLimited(5)));
    }

    #[tokio::test]
    async fn test_hosted_without_key() {
        let provider = provider(ProviderKind::Grok, None, "http://127.0.0.1:9");
        assert!(!provider.is_available().await);
        assert!(matches!(
            provider.call("grok-1", &[Message::user("hi")], 10, Some(0.5)).await,
            Err(Error::ProviderUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_lmstudio_availability() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        assert!(provider(ProviderKind::LmStudio, None, &server.uri()).is_available().await);
    }
}
