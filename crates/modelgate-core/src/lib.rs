//! Modelgate Core Library
//!
//! This crate provides cost-governed routing of LLM requests, including:
//! - Model catalog and fitness-ranked routing
//! - Provider abstraction with bounded retry (OpenRouter, OpenAI,
//!   Anthropic, Gemini, Grok, Ollama, LM Studio)
//! - Daily and monthly budget enforcement
//! - Provider health tracking and fallback
//! - Prompt construction
//! - Configuration management

pub mod config;
pub mod cost;
pub mod error;
pub mod fallback;
pub mod health;
pub mod llm;
pub mod prompts;
pub mod routing;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::cost::{CostManager, CostStats};
    pub use crate::error::{Error, Result};
    pub use crate::fallback::FallbackManager;
    pub use crate::health::{HealthMonitor, ProviderHealth};
    pub use crate::llm::{LlmClient, LlmResponse, Message, Provider, ProviderKind};
    pub use crate::routing::{Model, ModelRegistry, ModelRouter, Task, TaskType};
}
