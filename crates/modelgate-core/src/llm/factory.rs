//! Provider kinds and construction
//!
//! Providers are always built from an explicit kind. The factory never
//! mutates configuration, so concurrent fallback checks cannot interfere
//! with each other.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::anthropic::AnthropicProvider;
use super::http::ProviderSettings;
use super::ollama::OllamaProvider;
use super::openai_compat::OpenAiCompatibleProvider;
use super::provider::Provider;
use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::routing::ModelRegistry;

/// Known provider backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenRouter,
    OpenAi,
    Anthropic,
    Gemini,
    Grok,
    Ollama,
    LmStudio,
}

impl ProviderKind {
    /// All kinds, in global fallback preference order
    pub const ALL: [ProviderKind; 7] = [
        Self::OpenRouter,
        Self::OpenAi,
        Self::Anthropic,
        Self::Gemini,
        Self::Grok,
        Self::Ollama,
        Self::LmStudio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenRouter => "openrouter",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Grok => "grok",
            Self::Ollama => "ollama",
            Self::LmStudio => "lmstudio",
        }
    }

    /// Environment variable holding the API key, if the kind needs one
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::OpenRouter => Some("OPENROUTER_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::Grok => Some("XAI_API_KEY"),
            Self::Ollama | Self::LmStudio => None,
        }
    }

    /// Local inference servers are free and need no credentials
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Ollama | Self::LmStudio)
    }

    /// API base URL for this kind
    pub fn base_url(&self, config: &LlmConfig) -> String {
        let url = match self {
            Self::OpenRouter => "https://openrouter.ai/api/v1",
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
            Self::Grok => "https://api.x.ai/v1",
            Self::Ollama => config.ollama_base_url.as_str(),
            Self::LmStudio => config.lmstudio_base_url.as_str(),
        };
        url.trim_end_matches('/').to_string()
    }

    /// Model id as the vendor's own API expects it
    ///
    /// Catalog ids are `vendor/model`; aggregators and local servers take
    /// them verbatim, direct vendor APIs want the bare model name.
    pub fn wire_model_id<'a>(&self, model_id: &'a str) -> &'a str {
        match self {
            Self::OpenAi | Self::Anthropic | Self::Gemini | Self::Grok => model_id
                .split_once('/')
                .map(|(_, name)| name)
                .unwrap_or(model_id),
            _ => model_id,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| Error::UnknownProvider(s.to_string()))
    }
}

/// Builds providers by name
pub trait ProviderFactory: Send + Sync {
    fn create(&self, name: &str) -> Result<Arc<dyn Provider>>;
}

/// Factory producing the built-in HTTP providers
#[derive(Debug, Clone)]
pub struct DefaultProviderFactory {
    config: LlmConfig,
    registry: Arc<ModelRegistry>,
}

impl DefaultProviderFactory {
    pub fn new(config: LlmConfig, registry: Arc<ModelRegistry>) -> Self {
        Self { config, registry }
    }

    /// Build a provider of the given kind
    pub fn build(&self, kind: ProviderKind) -> Result<Arc<dyn Provider>> {
        let api_key = self.config.api_key_for(kind);
        let settings =
            ProviderSettings::from_config(kind, &self.config, api_key, self.registry.clone())?;

        let provider: Arc<dyn Provider> = match kind {
            ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(settings)),
            ProviderKind::Ollama => Arc::new(OllamaProvider::new(settings)),
            ProviderKind::OpenRouter
            | ProviderKind::OpenAi
            | ProviderKind::Gemini
            | ProviderKind::Grok
            | ProviderKind::LmStudio => Arc::new(OpenAiCompatibleProvider::new(settings)),
        };
        Ok(provider)
    }
}

impl ProviderFactory for DefaultProviderFactory {
    fn create(&self, name: &str) -> Result<Arc<dyn Provider>> {
        self.build(name.parse()?)
    }
}
