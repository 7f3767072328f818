//! LLM client - the entry point
//!
//! Composes the primary provider with routing, cost governance, health
//! tracking, fallback and prompt construction.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use super::factory::{DefaultProviderFactory, ProviderFactory};
use super::provider::Provider;
use super::types::{LlmResponse, Message};
use crate::config::Config;
use crate::cost::{CostManager, CostStats};
use crate::error::{Error, Result};
use crate::fallback::FallbackManager;
use crate::health::{HealthMonitor, ProviderHealth};
use crate::prompts::{ConsciousContext, SystemPromptManager};
use crate::routing::{ModelRegistry, ModelRouter, RouterConfig, Task, TaskType};

/// Rough context tokens assumed per memory entry
const TOKENS_PER_MEMORY: usize = 100;

/// Task-level LLM client
pub struct LlmClient {
    config: Config,
    registry: Arc<ModelRegistry>,
    primary: Arc<dyn Provider>,
    router: ModelRouter,
    costs: Arc<CostManager>,
    health: Arc<HealthMonitor>,
    fallback: FallbackManager,
    prompts: SystemPromptManager,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("provider", &self.primary.name())
            .field("fallback_chain", &self.fallback.fallback_chain())
            .finish_non_exhaustive()
    }
}

/// Builder for creating an LlmClient
#[derive(Default)]
pub struct LlmClientBuilder {
    config: Option<Config>,
    registry: Option<Arc<ModelRegistry>>,
    provider: Option<Arc<dyn Provider>>,
    factory: Option<Arc<dyn ProviderFactory>>,
    costs: Option<Arc<CostManager>>,
}

impl LlmClientBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a custom model catalog
    pub fn registry(mut self, registry: Arc<ModelRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use this provider instead of building the configured one
    pub fn provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Factory used for the primary provider and fallback candidates
    pub fn factory(mut self, factory: Arc<dyn ProviderFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Share a cost manager with other components
    pub fn cost_manager(mut self, costs: Arc<CostManager>) -> Self {
        self.costs = Some(costs);
        self
    }

    /// Build the client
    ///
    /// Fails with [`Error::ProviderUnavailable`] if the primary provider's
    /// liveness check fails.
    pub async fn build(self) -> Result<LlmClient> {
        let config = self.config.unwrap_or_default();
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ModelRegistry::with_defaults()));
        registry.validate()?;

        let factory = self.factory.unwrap_or_else(|| {
            Arc::new(DefaultProviderFactory::new(
                config.llm.clone(),
                registry.clone(),
            )) as Arc<dyn ProviderFactory>
        });
        let primary = match self.provider {
            Some(provider) => provider,
            None => factory.create(&config.llm.provider)?,
        };

        let health = Arc::new(HealthMonitor::new());
        health.register_provider(primary.name());
        if !health.check_provider_health(primary.as_ref()).await {
            return Err(Error::ProviderUnavailable(primary.name().to_string()));
        }

        let costs = self
            .costs
            .unwrap_or_else(|| Arc::new(CostManager::from_config(&config, registry.clone())));
        let router = ModelRouter::new(
            RouterConfig::from_config(&config),
            registry.clone(),
            primary.clone(),
            costs.clone(),
        );
        let fallback = FallbackManager::new(primary.name(), health.clone(), factory);
        let prompts = SystemPromptManager::new(&config.prompts);

        info!(provider = primary.name(), "LLM client ready");

        Ok(LlmClient {
            config,
            registry,
            primary,
            router,
            costs,
            health,
            fallback,
            prompts,
        })
    }
}

impl LlmClient {
    /// Create a client for the configured provider
    pub async fn connect(config: Config) -> Result<Self> {
        LlmClientBuilder::new().config(config).build().await
    }

    /// Create a new builder for LlmClient
    pub fn builder() -> LlmClientBuilder {
        LlmClientBuilder::new()
    }

    /// Answer user input on the best model for the task type
    pub async fn generate_response(
        &self,
        input: &str,
        task_type: TaskType,
        memory: &[String],
        use_framework: bool,
    ) -> Result<LlmResponse> {
        let messages = self.prompts.build_messages(input, memory, use_framework);
        let task = Task::builder(task_type, input)
            .context_length(input.len() + memory.len() * TOKENS_PER_MEMORY)
            .max_tokens(self.config.llm.default_max_tokens)
            .temperature(self.config.llm.default_temperature)
            .build()?;

        let response = self.router.route_with_messages(&task, &messages).await?;
        self.costs
            .record_cost(&response.model, response.cost_usd, Some(task_type));
        Ok(response)
    }

    /// Consciousness-framed generation, capped at the configured per-task budget
    pub async fn generate_conscious_response(
        &self,
        context: &ConsciousContext,
        memory: &[String],
    ) -> Result<LlmResponse> {
        let prompt = self.prompts.build_conscious_prompt(context, memory);
        let task = Task::builder(TaskType::ConsciousReasoning, prompt)
            .max_tokens(self.config.llm.default_max_tokens)
            .temperature(self.config.llm.default_temperature)
            .budget_usd(self.config.cost.consciousness_budget_usd)
            .build()?;

        let response = self.router.route_to_optimal_model(&task).await?;
        self.costs.record_cost(
            &response.model,
            response.cost_usd,
            Some(TaskType::ConsciousReasoning),
        );
        Ok(response)
    }

    /// Send a conversation to a specific model, falling back to another
    /// provider if the primary fails. `None` uses the provider's default
    /// temperature.
    pub async fn complete_with_fallback(
        &self,
        model_id: &str,
        messages: &[Message],
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let response = self
            .fallback
            .try_with_fallback(self.primary.as_ref(), model_id, messages, 0, temperature)
            .await?;
        self.costs
            .record_cost(&response.model, response.cost_usd, None);
        Ok(response)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn primary_provider(&self) -> &str {
        self.primary.name()
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }

    pub fn fallback(&self) -> &FallbackManager {
        &self.fallback
    }

    pub fn cost_stats(&self) -> CostStats {
        self.costs.stats()
    }

    /// Preferred model for a task type
    pub fn model_for_task(&self, task_type: TaskType) -> &str {
        self.config.routing.model_for_task(task_type)
    }

    /// Whether running `task` on the named model stays within budget
    pub fn can_afford(&self, task: &Task, model_id: &str) -> Result<()> {
        let model = self
            .registry
            .get(model_id)
            .ok_or_else(|| Error::ModelNotFound(model_id.to_string()))?;
        self.costs.can_afford(task, model)
    }

    pub fn cost_effective_alternative(&self, task: &Task, current_model_id: &str) -> Result<String> {
        self.costs.cost_effective_alternative(task, current_model_id)
    }

    pub fn provider_health(&self, name: &str) -> Option<ProviderHealth> {
        self.health.get_health(name)
    }

    pub fn all_provider_health(&self) -> HashMap<String, ProviderHealth> {
        self.health.get_all_health()
    }

    pub fn available_providers(&self) -> Vec<String> {
        self.health.get_available_providers()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::EmotionalState;
    use crate::test_support::{MapFactory, ScriptedProvider};

    async fn client_with(provider: Arc<ScriptedProvider>, factory: MapFactory) -> Result<LlmClient> {
        LlmClient::builder()
            .provider(provider)
            .factory(Arc::new(factory))
            .build()
            .await
    }

    #[tokio::test]
    async fn test_build_rejects_unavailable_primary() {
        let provider = Arc::new(ScriptedProvider::succeeding("openrouter").unavailable());
        let err = client_with(provider, MapFactory::default()).await.unwrap_err();
        assert!(matches!(err, Error::ProviderUnavailable(ref name) if name == "openrouter"));
    }

    #[tokio::test]
    async fn test_build_registers_primary_health() {
        let provider = Arc::new(ScriptedProvider::succeeding("openrouter"));
        let client = client_with(provider, MapFactory::default()).await.unwrap();

        assert_eq!(client.available_providers(), vec!["openrouter"]);
        assert!(client.provider_health("openrouter").unwrap().available);
        assert_eq!(client.fallback().fallback_chain()[0], "openrouter");
    }

    #[tokio::test]
    async fn test_generate_response_records_cost() {
        let provider = Arc::new(ScriptedProvider::succeeding("openrouter"));
        let client = client_with(provider.clone(), MapFactory::default())
            .await
            .unwrap();

        let response = client
            .generate_response("What is 2 + 2?", TaskType::Analytical, &[], true)
            .await
            .unwrap();

        assert!(client.router().is_configured(&response.model));
        let stats = client.cost_stats();
        assert_eq!(stats.transaction_count, 1);
        assert!((stats.daily_spend_usd - 0.01).abs() < 1e-9);
        assert_eq!(provider.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_conscious_response_uses_reasoning_models() {
        let provider = Arc::new(ScriptedProvider::succeeding("openrouter"));
        let client = client_with(provider, MapFactory::default()).await.unwrap();

        let context = ConsciousContext {
            identity: "Navigator".to_string(),
            current_input: "Where next?".to_string(),
            emotional_state: EmotionalState::default(),
        };
        let response = client
            .generate_conscious_response(&context, &[])
            .await
            .unwrap();

        let model = client.registry.get(&response.model).unwrap();
        assert!(model.capabilities.reasoning && model.capabilities.creativity);
        assert_eq!(client.cost_stats().transaction_count, 1);
    }

    #[tokio::test]
    async fn test_complete_with_fallback_switches_provider() {
        let primary = Arc::new(ScriptedProvider::succeeding("openrouter").with_script(&[true, false]));
        let backup = Arc::new(ScriptedProvider::succeeding("openai"));
        let client = client_with(primary, MapFactory::default().with(backup.clone()))
            .await
            .unwrap();

        // First scripted outcome succeeds
        client
            .complete_with_fallback("openai/gpt-4-turbo", &[Message::user("one")], None)
            .await
            .unwrap();
        // Second fails, so the backup answers
        let response = client
            .complete_with_fallback("openai/gpt-4-turbo", &[Message::user("two")], Some(0.0))
            .await
            .unwrap();

        assert!(response.content.starts_with("openai answered"));
        assert_eq!(backup.calls().len(), 1);
        assert_eq!(client.cost_stats().transaction_count, 2);
    }

    #[tokio::test]
    async fn test_accessors() {
        let provider = Arc::new(ScriptedProvider::succeeding("openrouter"));
        let client = client_with(provider, MapFactory::default()).await.unwrap();

        assert_eq!(client.primary_provider(), "openrouter");
        assert_eq!(
            client.model_for_task(TaskType::RealTime),
            "anthropic/claude-3-haiku"
        );

        let task = Task::builder(TaskType::Operational, "hello").build().unwrap();
        client.can_afford(&task, "anthropic/claude-3-haiku").unwrap();
        assert!(matches!(
            client.can_afford(&task, "no/such-model"),
            Err(Error::ModelNotFound(_))
        ));
        assert_eq!(
            client
                .cost_effective_alternative(&task, "anthropic/claude-3-opus")
                .unwrap(),
            "openai/gpt-4-turbo"
        );
    }
}
