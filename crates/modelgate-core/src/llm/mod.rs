//! LLM integration
//!
//! This module provides:
//! - Message and response types, plus the OpenAI-compatible wire format
//! - The `Provider` capability with bounded retry
//! - Concrete HTTP providers (OpenAI-compatible, Anthropic, Ollama)
//! - A pure provider factory keyed by provider name
//! - `LlmClient`, the entry point composing routing, cost and fallback

mod anthropic;
mod client;
mod factory;
mod http;
mod ollama;
mod openai_compat;
mod provider;
mod retry;
mod types;

pub use anthropic::AnthropicProvider;
pub use client::{LlmClient, LlmClientBuilder};
pub use factory::{DefaultProviderFactory, ProviderFactory, ProviderKind};
pub use http::ProviderSettings;
pub use ollama::OllamaProvider;
pub use openai_compat::OpenAiCompatibleProvider;
pub use provider::{Provider, price_usage};
pub use retry::RetryPolicy;
pub use types::{
    ChatRequest, ChatResponse, Choice, FinishReason, LlmResponse, Message, MessageRole,
    TokenUsage, Usage,
};
