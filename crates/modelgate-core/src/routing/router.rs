//! Model Router - fitness-ranked model selection under budget
//!
//! The router scores every configured catalog model against a task, then
//! tries them best-first through the active provider. Candidates the cost
//! manager will not admit are skipped; failed attempts feed back into each
//! model's reliability.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::registry::ModelRegistry;
use super::types::{Model, ModelPerformance, ScoredModel, Task};
use crate::config::Config;
use crate::cost::CostManager;
use crate::error::{Error, Result};
use crate::llm::{LlmResponse, Message, Provider};

/// Fitness weights
const REASONING_WEIGHT: f64 = 40.0;
const CREATIVITY_WEIGHT: f64 = 30.0;
const SPEED_WEIGHT: f64 = 20.0;
const TOOL_USE_WEIGHT: f64 = 15.0;
const CONTEXT_WEIGHT: f64 = 15.0;
const COST_WEIGHT: f64 = 10.0;
const HISTORY_WEIGHT: f64 = 5.0;

/// Highest attainable fitness score
pub const MAX_FITNESS: f64 = REASONING_WEIGHT
    + CREATIVITY_WEIGHT
    + SPEED_WEIGHT
    + TOOL_USE_WEIGHT
    + CONTEXT_WEIGHT
    + COST_WEIGHT
    + HISTORY_WEIGHT;

/// Configuration for the model router
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Models routing may use; catalog entries outside this set are ignored
    pub configured_models: BTreeSet<String>,
    /// Completion budget assumed when a task leaves `max_tokens` at zero
    pub default_max_tokens: u32,
    /// Cost at which the cost term reaches zero for tasks without a budget
    pub reference_max_cost_usd: f64,
}

impl RouterConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            configured_models: config.routing.configured_models(),
            default_max_tokens: config.llm.default_max_tokens,
            reference_max_cost_usd: config.routing.reference_max_cost_usd,
        }
    }
}

/// How well `model` fits `task`
///
/// Capability matches are worth 40/30/20/15 points (reasoning, creativity,
/// speed, tool use), an adequate context window 15, cost efficiency 10 and
/// past reliability 5.
pub fn fitness_score(
    task: &Task,
    model: &Model,
    estimated_cost_usd: f64,
    reference_max_cost_usd: f64,
    reliability: Option<f64>,
) -> f64 {
    let required = task.requirements();
    let caps = model.capabilities;
    let mut score = 0.0;

    if required.reasoning && caps.reasoning {
        score += REASONING_WEIGHT;
    }
    if required.creativity && caps.creativity {
        score += CREATIVITY_WEIGHT;
    }
    if required.speed && caps.speed {
        score += SPEED_WEIGHT;
    }
    if required.tool_use && caps.tool_use {
        score += TOOL_USE_WEIGHT;
    }

    let needed = task.context_length();
    if needed == 0 || model.context_length >= needed {
        score += CONTEXT_WEIGHT;
    } else {
        score += CONTEXT_WEIGHT * (model.context_length as f64 / needed as f64);
    }

    let ceiling = if task.has_budget() {
        task.budget_usd()
    } else {
        reference_max_cost_usd
    };
    if ceiling > 0.0 {
        score += COST_WEIGHT * (1.0 - estimated_cost_usd / ceiling).max(0.0);
    }

    score + HISTORY_WEIGHT * reliability.unwrap_or(0.0)
}

/// Fitness-ranked router over a single provider
pub struct ModelRouter {
    config: RouterConfig,
    registry: Arc<ModelRegistry>,
    provider: Arc<dyn Provider>,
    costs: Arc<CostManager>,
    performance: Arc<RwLock<HashMap<String, ModelPerformance>>>,
}

impl std::fmt::Debug for ModelRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRouter")
            .field("provider", &self.provider.name())
            .field("configured_models", &self.config.configured_models)
            .finish_non_exhaustive()
    }
}

impl ModelRouter {
    pub fn new(
        config: RouterConfig,
        registry: Arc<ModelRegistry>,
        provider: Arc<dyn Provider>,
        costs: Arc<CostManager>,
    ) -> Self {
        Self {
            config,
            registry,
            provider,
            costs,
            performance: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.provider
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn is_configured(&self, model_id: &str) -> bool {
        self.config.configured_models.contains(model_id)
    }

    /// Every configured catalog model, best first
    ///
    /// Ties are broken by model id so the order is reproducible.
    pub async fn score_candidates(&self, task: &Task) -> Vec<ScoredModel> {
        self.score_conversation(task, task.prompt().len()).await
    }

    /// Rank candidates for a conversation of `prompt_chars` characters
    async fn score_conversation(&self, task: &Task, prompt_chars: usize) -> Vec<ScoredModel> {
        let performance = self.performance.read().await;

        let mut candidates: Vec<ScoredModel> = self
            .registry
            .list()
            .into_iter()
            .filter(|model| self.is_configured(&model.id))
            .map(|model| {
                let estimated_cost_usd =
                    self.costs.estimate_conversation(task, prompt_chars, model);
                let reliability = performance.get(&model.id).map(|p| p.reliability);
                ScoredModel {
                    score: fitness_score(
                        task,
                        model,
                        estimated_cost_usd,
                        self.config.reference_max_cost_usd,
                        reliability,
                    ),
                    model: model.clone(),
                    estimated_cost_usd,
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.model.id.cmp(&b.model.id))
        });
        candidates
    }

    /// Answer a task's prompt on the best admissible model
    pub async fn route_to_optimal_model(&self, task: &Task) -> Result<LlmResponse> {
        let messages = [Message::user(task.prompt())];
        self.route_with_messages(task, &messages).await
    }

    /// Like [`route_to_optimal_model`](Self::route_to_optimal_model) with a
    /// caller-built conversation
    pub async fn route_with_messages(
        &self,
        task: &Task,
        messages: &[Message],
    ) -> Result<LlmResponse> {
        let prompt_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        let candidates = self.score_conversation(task, prompt_chars).await;
        if candidates.is_empty() {
            return Err(Error::NoSuitableModel(
                "no configured model is present in the catalog".to_string(),
            ));
        }

        for candidate in candidates {
            let model_id = candidate.model.id.as_str();

            if task.has_budget() && candidate.estimated_cost_usd > task.budget_usd() {
                debug!(
                    model = model_id,
                    estimate = candidate.estimated_cost_usd,
                    budget = task.budget_usd(),
                    "Skipping model over task budget"
                );
                continue;
            }
            if let Err(e) = self
                .costs
                .can_afford_conversation(task, prompt_chars, &candidate.model)
            {
                debug!(model = model_id, reason = %e, "Skipping unaffordable model");
                continue;
            }

            info!(
                model = model_id,
                score = candidate.score,
                task_type = %task.task_type(),
                "Routing task"
            );

            let started = Instant::now();
            match self
                .provider
                .call_with_retry(model_id, messages, task.max_tokens(), Some(task.temperature()))
                .await
            {
                Ok(response) => {
                    self.record_success(model_id, &response).await;
                    return Ok(response);
                }
                Err(e) => {
                    warn!(
                        model = model_id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        error = %e,
                        "Model attempt failed"
                    );
                    self.record_failure(model_id).await;
                }
            }
        }

        Err(Error::AllCandidatesExhausted)
    }

    async fn record_success(&self, model_id: &str, response: &LlmResponse) {
        let mut performance = self.performance.write().await;
        performance
            .entry(model_id.to_string())
            .or_insert_with(|| ModelPerformance::new(model_id))
            .record_success(response.response_time, response.cost_usd);
    }

    async fn record_failure(&self, model_id: &str) {
        let mut performance = self.performance.write().await;
        performance
            .entry(model_id.to_string())
            .or_insert_with(|| ModelPerformance::new(model_id))
            .record_failure();
    }

    /// Performance record of a model, if it has been attempted
    pub async fn performance(&self, model_id: &str) -> Option<ModelPerformance> {
        self.performance.read().await.get(model_id).cloned()
    }

    /// Every performance record, ordered by model id
    pub async fn all_performance(&self) -> Vec<ModelPerformance> {
        let mut records: Vec<ModelPerformance> =
            self.performance.read().await.values().cloned().collect();
        records.sort_by(|a, b| a.model_id.cmp(&b.model_id));
        records
    }

    /// Cheaper configured model that still meets the task's hard requirements
    pub fn cost_effective_alternative(&self, task: &Task, current_model_id: &str) -> Result<String> {
        self.costs
            .cost_effective_alternative_among(task, current_model_id, |id| self.is_configured(id))
    }
}
