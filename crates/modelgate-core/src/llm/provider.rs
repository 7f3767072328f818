//! The provider capability
//!
//! A provider is a callable LLM backend. Routing and fallback only ever see
//! `dyn Provider`, so tests can substitute scripted in-memory doubles.

use async_trait::async_trait;

use super::retry::RetryPolicy;
use super::types::{LlmResponse, Message, TokenUsage};
use crate::error::Result;
use crate::routing::ModelRegistry;

/// Per-million prices charged for models missing from the catalog
const UNKNOWN_MODEL_PRICE: f64 = 1.0;

/// An LLM backend
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name (e.g. "openrouter")
    fn name(&self) -> &str;

    /// Make a single request
    ///
    /// A zero `max_tokens` or a `None` temperature means the provider's
    /// configured default.
    async fn call(
        &self,
        model_id: &str,
        messages: &[Message],
        max_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<LlmResponse>;

    /// Liveness or credential check; may perform network I/O
    async fn is_available(&self) -> bool;

    /// Retry behaviour used by [`call_with_retry`](Provider::call_with_retry)
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }

    /// Make a request, retrying failures per [`retry_policy`](Provider::retry_policy)
    async fn call_with_retry(
        &self,
        model_id: &str,
        messages: &[Message],
        max_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        self.retry_policy()
            .run(self.name(), || {
                self.call(model_id, messages, max_tokens, temperature)
            })
            .await
    }
}

/// Cost of a hosted call, priced from the catalog
pub fn price_usage(registry: &ModelRegistry, model_id: &str, usage: &TokenUsage) -> f64 {
    let (input, output) = registry
        .get(model_id)
        .map(|m| (m.input_price_per_million, m.output_price_per_million))
        .unwrap_or((UNKNOWN_MODEL_PRICE, UNKNOWN_MODEL_PRICE));

    (usage.prompt_tokens as f64 / 1_000_000.0) * input
        + (usage.completion_tokens as f64 / 1_000_000.0) * output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_known_model() {
        let registry = ModelRegistry::with_defaults();
        let cost = price_usage(
            &registry,
            "anthropic/claude-3-sonnet",
            &TokenUsage::new(1_000_000, 100_000),
        );
        // 3.00 input + 1.50 output
        assert!((cost - 4.5).abs() < 0.001);
    }

    #[test]
    fn test_price_unknown_model() {
        let registry = ModelRegistry::with_defaults();
        let cost = price_usage(&registry, "mystery/model", &TokenUsage::new(500_000, 500_000));
        assert!((cost - 1.0).abs() < 0.001);
    }
}
