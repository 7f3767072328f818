//! Ollama local inference provider

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{ProviderSettings, error_for_response};
use super::provider::Provider;
use super::retry::RetryPolicy;
use super::types::{FinishReason, LlmResponse, Message, TokenUsage};
use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: Option<f32>,
    top_p: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    message: Message,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

/// Provider for a local Ollama server; calls are free
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    settings: ProviderSettings,
}

impl OllamaProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Provider for OllamaProvider {
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
        let started = Instant::now();
        let request = ChatRequest {
            model: model_id,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: Some(self.settings.temperature_or_default(temperature)),
                top_p: self.settings.default_top_p,
                num_predict: self.settings.max_tokens_or_default(max_tokens),
            },
        };

        debug!(model = model_id, messages = messages.len(), "Sending Ollama chat request");

        let response = self
            .settings
            .http
            .post(self.settings.url("/api/chat"))
            .json(&request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        if !response.status().is_success() {
            return error_for_response(self.settings.kind, response).await;
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMError(format!("Failed to parse response: {}", e)))?;

        Ok(LlmResponse {
            content: body.message.content,
            model: if body.model.is_empty() {
                model_id.to_string()
            } else {
                body.model
            },
            usage: TokenUsage::new(body.prompt_eval_count, body.eval_count),
            cost_usd: 0.0,
            response_time: started.elapsed(),
            finish_reason: body
                .done_reason
                .as_deref()
                .map(FinishReason::from_vendor)
                .unwrap_or(FinishReason::Stop),
        })
    }

    async fn is_available(&self) -> bool {
        match self.settings.http.get(self.settings.url("/api/tags")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Ollama liveness check failed");
                false
            }
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.settings.retry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::llm::ProviderKind;
    use crate::routing::ModelRegistry;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(url: &str) -> OllamaProvider {
        let settings = ProviderSettings::from_config(
            ProviderKind::Ollama,
            &LlmConfig::default(),
            None,
            Arc::new(ModelRegistry::with_defaults()),
        )
        .unwrap()
        .with_base_url(url);
        OllamaProvider::new(settings)
    }

    #[tokio::test]
    async fn test_call_uses_defaults_and_is_free() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "llama3",
                "stream": false,
                "options": {"num_predict": 2000}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3",
                "message": {"role": "assistant", "content": "local answer"},
                "done": true,
                "prompt_eval_count": 12,
                "eval_count": 30
            })))
            .mount(&server)
            .await;

        let response = provider(&server.uri())
            .call("llama3", &[Message::user("hi")], 0, None)
            .await
            .unwrap();

        assert_eq!(response.content, "local answer");
        assert_eq!(response.usage.total_tokens, 42);
        assert_eq!(response.cost_usd, 0.0);
    }

    #[tokio::test]
    async fn test_availability_reflects_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"models": []})))
            .mount(&server)
            .await;
        assert!(provider(&server.uri()).is_available().await);

        let down = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&down)
            .await;
        assert!(!provider(&down.uri()).is_available().await);
    }
}
