//! Anthropic Messages API provider

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http::{ProviderSettings, error_for_response};
use super::provider::{Provider, price_usage};
use super::retry::RetryPolicy;
use super::types::{FinishReason, LlmResponse, Message, MessageRole, TokenUsage};
use crate::error::{Error, Result};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<&'a Message>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: String,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: MessagesUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Split system messages out of a conversation
///
/// The Messages API takes system text as a top-level field rather than as a
/// message role.
fn split_system<'a>(messages: &'a [Message]) -> (Option<String>, Vec<&'a Message>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.role == MessageRole::System)
        .map(|m| m.content.as_str())
        .collect();
    let rest = messages
        .iter()
        .filter(|m| m.role != MessageRole::System)
        .collect();

    let system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };
    (system, rest)
}

/// Provider for api.anthropic.com
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    settings: ProviderSettings,
}

impl AnthropicProvider {
    pub fn new(settings: ProviderSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
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
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::ProviderUnavailable(kind.to_string()))?;

        let started = Instant::now();
        let (system, conversation) = split_system(messages);
        let request = MessagesRequest {
            model: kind.wire_model_id(model_id),
            max_tokens: self.settings.max_tokens_or_default(max_tokens),
            temperature: Some(self.settings.temperature_or_default(temperature)),
            system,
            messages: conversation,
        };

        debug!(model = request.model, messages = request.messages.len(), "Sending messages request");

        let response = self
            .settings
            .http
            .post(self.settings.url("/messages"))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .await
            .map_err(Error::NetworkError)?;

        if !response.status().is_success() {
            return error_for_response(kind, response).await;
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| Error::LLMError(format!("Failed to parse response: {}", e)))?;

        let content: String = body
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text.as_str())
            .collect();
        let usage = TokenUsage::new(body.usage.input_tokens, body.usage.output_tokens);

        Ok(LlmResponse {
            content,
            model: if body.model.is_empty() {
                model_id.to_string()
            } else {
                body.model
            },
            cost_usd: price_usage(&self.settings.registry, model_id, &usage),
            usage,
            response_time: started.elapsed(),
            finish_reason: body
                .stop_reason
                .as_deref()
                .map(FinishReason::from_vendor)
                .unwrap_or(FinishReason::Unknown),
        })
    }

    async fn is_available(&self) -> bool {
        self.settings.has_api_key()
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.settings.retry
    }
}
