//! Static model catalog
//!
//! The registry maps model identifiers to their capabilities, context window
//! and pricing. It also carries a hand-curated "hierarchy" (most to least
//! capable) used when searching for a cheaper model that still fits a task.

use std::collections::HashMap;

use super::types::{Capabilities, Model};
use crate::error::{Error, Result};

/// Catalog of known models
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Model>,
    hierarchy: Vec<String>,
}

impl ModelRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
            hierarchy: Vec::new(),
        }
    }

    /// Create a registry with the default catalog
    /// Prices are USD per million tokens.
    pub fn with_defaults() -> Self {
        let all = Capabilities {
            reasoning: true,
            creativity: true,
            speed: true,
            tool_use: true,
            multimodal: false,
            multilingual: true,
            math: true,
        };

        let mut registry = Self::new();

        registry.register(
            Model::new("anthropic/claude-3-opus", "Claude 3 Opus", "anthropic")
                .with_context_length(200_000)
                .with_pricing(15.0, 75.0)
                .with_capabilities(Capabilities { speed: false, ..all }),
        );
        registry.register(
            Model::new("openai/gpt-4-turbo", "GPT-4 Turbo", "openai")
                .with_context_length(128_000)
                .with_pricing(10.0, 30.0)
                .with_capabilities(all),
        );
        registry.register(
            Model::new("anthropic/claude-3-sonnet", "Claude 3 Sonnet", "anthropic")
                .with_context_length(200_000)
                .with_pricing(3.0, 15.0)
                .with_capabilities(all),
        );
        registry.register(
            Model::new("google/gemini-pro-1.5", "Gemini Pro 1.5", "google")
                .with_context_length(1_000_000)
                .with_pricing(1.25, 5.0)
                .with_capabilities(Capabilities {
                    multimodal: true,
                    ..all
                }),
        );
        registry.register(
            Model::new("openai/gpt-4-vision-preview", "GPT-4 Vision", "openai")
                .with_context_length(128_000)
                .with_pricing(10.0, 30.0)
                .with_capabilities(Capabilities {
                    multimodal: true,
                    ..all
                }),
        );
        registry.register(
            Model::new("anthropic/claude-3-haiku", "Claude 3 Haiku", "anthropic")
                .with_context_length(200_000)
                .with_pricing(0.25, 1.25)
                .with_capabilities(Capabilities {
                    speed: true,
                    tool_use: true,
                    multilingual: true,
                    ..Default::default()
                }),
        );
        registry.register(
            Model::new("mistralai/mixtral-8x22b", "Mixtral 8x22B", "mistralai")
                .with_context_length(64_000)
                .with_pricing(2.0, 6.0)
                .with_capabilities(Capabilities {
                    tool_use: false,
                    ..all
                }),
        );
        registry.register(
            Model::new("cohere/command-r-plus", "Command R+", "cohere")
                .with_context_length(128_000)
                .with_pricing(3.0, 15.0)
                .with_capabilities(Capabilities {
                    speed: true,
                    tool_use: true,
                    multilingual: true,
                    ..Default::default()
                }),
        );
        registry.register(
            Model::new("meta-llama/llama-3-70b-instruct", "Llama 3 70B", "meta")
                .with_context_length(8_000)
                .with_pricing(0.90, 0.90)
                .with_capabilities(Capabilities {
                    tool_use: false,
                    ..all
                }),
        );
        registry.register(
            Model::new("qwen/qwen-2-72b-instruct", "Qwen 2 72B", "qwen")
                .with_context_length(32_000)
                .with_pricing(1.50, 1.50)
                .with_capabilities(Capabilities {
                    reasoning: true,
                    speed: true,
                    multilingual: true,
                    math: true,
                    ..Default::default()
                }),
        );

        registry.hierarchy = [
            "anthropic/claude-3-opus",
            "openai/gpt-4-turbo",
            "anthropic/claude-3-sonnet",
            "google/gemini-pro-1.5",
            "mistralai/mixtral-8x22b",
            "cohere/command-r-plus",
            "meta-llama/llama-3-70b-instruct",
            "anthropic/claude-3-haiku",
            "qwen/qwen-2-72b-instruct",
        ]
        .iter()
        .map(|id| id.to_string())
        .collect();

        registry
    }

    /// Register a model
    pub fn register(&mut self, model: Model) {
        self.models.insert(model.id.clone(), model);
    }

    /// Replace the capability hierarchy
    pub fn with_hierarchy(mut self, hierarchy: Vec<String>) -> Self {
        self.hierarchy = hierarchy;
        self
    }

    /// Get a model by ID
    pub fn get(&self, model_id: &str) -> Option<&Model> {
        self.models.get(model_id)
    }

    /// All models, ordered by id
    pub fn list(&self) -> Vec<&Model> {
        let mut models: Vec<&Model> = self.models.values().collect();
        models.sort_by(|a, b| a.id.cmp(&b.id));
        models
    }

    /// Model ids from most to least capable
    pub fn hierarchy(&self) -> &[String] {
        &self.hierarchy
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Check that every hierarchy entry exists in the catalog
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = self
            .hierarchy
            .iter()
            .filter(|id| !self.models.contains_key(id.as_str()))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::ConfigError(format!(
                "model hierarchy references uncatalogued models: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Resolve a short model alias to a catalog id
///
/// Anything containing a `/` is already an id and is returned unchanged, as
/// are unknown names.
pub fn resolve_model_id(name: &str) -> String {
    if name.contains('/') {
        return name.to_string();
    }

    let resolved = match name.to_lowercase().as_str() {
        "claude-opus" => "anthropic/claude-3-opus",
        "claude-sonnet" => "anthropic/claude-3-sonnet",
        "claude-haiku" => "anthropic/claude-3-haiku",
        "gpt4-turbo" => "openai/gpt-4-turbo",
        "gpt4-vision" => "openai/gpt-4-vision-preview",
        "gemini-pro" => "google/gemini-pro-1.5",
        "mixtral" => "mistralai/mixtral-8x22b",
        "command-r" => "cohere/command-r-plus",
        "llama3-70b" => "meta-llama/llama-3-70b-instruct",
        "qwen-72b" => "qwen/qwen-2-72b-instruct",
        _ => return name.to_string(),
    };
    resolved.to_string()
}
