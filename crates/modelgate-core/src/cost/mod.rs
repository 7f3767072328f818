//! Cost management and budget enforcement
//!
//! This module provides:
//! - Task cost estimation from model pricing (approximate, no tokenizer)
//! - Daily and monthly spend tracking with period resets
//! - Budget admission with an overage tolerance
//! - A bounded spend history for reporting

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::config::CostConfig;
use crate::error::{Error, Result};
use crate::routing::{Model, ModelRegistry, Task, TaskType};

/// Maximum number of spend records kept in memory
pub const MAX_HISTORY: usize = 1000;

/// Characters per token used by the estimation heuristic
const CHARS_PER_TOKEN: usize = 4;

/// Source of the current time
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Estimate the cost of running a task on a model
///
/// Prompt tokens are approximated as `len(prompt) / 4`; the completion is
/// assumed to use the task's full `max_tokens` (or `default_max_tokens`
/// when the task leaves it at zero).
pub fn estimate_task_cost(task: &Task, model: &Model, default_max_tokens: u32) -> f64 {
    estimate_conversation_cost(task, task.prompt().len(), model, default_max_tokens)
}

/// Like [`estimate_task_cost`], with the prompt size taken from the whole
/// conversation actually sent (system prompt and memory included)
pub fn estimate_conversation_cost(
    task: &Task,
    prompt_chars: usize,
    model: &Model,
    default_max_tokens: u32,
) -> f64 {
    let prompt_tokens = (prompt_chars / CHARS_PER_TOKEN) as u64;
    let completion_tokens = if task.max_tokens() > 0 {
        task.max_tokens()
    } else {
        default_max_tokens
    } as u64;
    model.cost_for(prompt_tokens, completion_tokens)
}

/// A single spend event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostRecord {
    /// Unique identifier for this record
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub model_id: String,
    pub cost_usd: f64,
    pub task_type: Option<TaskType>,
}

/// Snapshot of spend against budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostStats {
    pub daily_spend_usd: f64,
    pub monthly_spend_usd: f64,
    pub daily_budget_usd: f64,
    pub monthly_budget_usd: f64,
    pub daily_remaining_usd: f64,
    pub monthly_remaining_usd: f64,
    pub transaction_count: usize,
    pub average_cost_usd: f64,
}

#[derive(Debug)]
struct CostState {
    daily_spend: f64,
    monthly_spend: f64,
    day_marker: NaiveDate,
    month_marker: (i32, u32),
    history: VecDeque<CostRecord>,
}

impl CostState {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            daily_spend: 0.0,
            monthly_spend: 0.0,
            day_marker: now.date_naive(),
            month_marker: (now.year(), now.month()),
            history: VecDeque::new(),
        }
    }

    /// Zero any period whose marker no longer matches `now`
    ///
    /// Day and month are tracked separately so a daily reset never hides a
    /// month change.
    fn roll_periods(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if today != self.day_marker {
            info!(
                previous = %self.day_marker,
                spent = self.daily_spend,
                "Resetting daily spend"
            );
            self.daily_spend = 0.0;
            self.day_marker = today;
        }

        let month = (now.year(), now.month());
        if month != self.month_marker {
            info!(
                year = month.0,
                month = month.1,
                spent = self.monthly_spend,
                "Resetting monthly spend"
            );
            self.monthly_spend = 0.0;
            self.month_marker = month;
        }
    }
}

/// Tracks spend and admits or rejects work against budgets
pub struct CostManager {
    config: CostConfig,
    registry: Arc<ModelRegistry>,
    default_max_tokens: u32,
    state: RwLock<CostState>,
    clock: Clock,
}

impl std::fmt::Debug for CostManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostManager")
            .field("config", &self.config)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl CostManager {
    /// Create a cost manager using the system clock
    pub fn new(config: CostConfig, registry: Arc<ModelRegistry>, default_max_tokens: u32) -> Self {
        Self::with_clock(config, registry, default_max_tokens, Arc::new(Utc::now))
    }

    /// Create a cost manager with a custom time source
    pub fn with_clock(
        config: CostConfig,
        registry: Arc<ModelRegistry>,
        default_max_tokens: u32,
        clock: Clock,
    ) -> Self {
        let state = CostState::new(clock());
        Self {
            config,
            registry,
            default_max_tokens,
            state: RwLock::new(state),
            clock,
        }
    }

    /// Create a cost manager from the full configuration
    pub fn from_config(config: &crate::config::Config, registry: Arc<ModelRegistry>) -> Self {
        Self::new(
            config.cost.clone(),
            registry,
            config.llm.default_max_tokens,
        )
    }

    pub fn daily_budget(&self) -> f64 {
        self.config.daily_budget_usd
    }

    pub fn monthly_budget(&self) -> f64 {
        self.config.monthly_budget_usd
    }

    /// Lock state for writing after rolling any elapsed period
    fn current(&self) -> RwLockWriteGuard<'_, CostState> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.roll_periods((self.clock)());
        state
    }

    /// Estimated cost of a task on a model
    pub fn estimate_task_cost(&self, task: &Task, model: &Model) -> f64 {
        estimate_task_cost(task, model, self.default_max_tokens)
    }

    pub fn estimate_conversation(&self, task: &Task, prompt_chars: usize, model: &Model) -> f64 {
        estimate_conversation_cost(task, prompt_chars, model, self.default_max_tokens)
    }

    /// Check whether running `task` on `model` keeps spend within budget
    ///
    /// Spend may exceed a budget by at most the configured tolerance.
    pub fn can_afford(&self, task: &Task, model: &Model) -> Result<()> {
        self.can_afford_conversation(task, task.prompt().len(), model)
    }

    /// Admission check for a conversation of `prompt_chars` characters
    pub fn can_afford_conversation(
        &self,
        task: &Task,
        prompt_chars: usize,
        model: &Model,
    ) -> Result<()> {
        let estimate = self.estimate_conversation(task, prompt_chars, model);
        let state = self.current();
        let allowance = 1.0 + self.config.overage_tolerance;

        let projected_daily = state.daily_spend + estimate;
        if projected_daily > self.config.daily_budget_usd * allowance {
            debug!(
                model = %model.id,
                projected = projected_daily,
                budget = self.config.daily_budget_usd,
                "Daily budget would be exceeded"
            );
            return Err(Error::BudgetExceeded(
                "daily".to_string(),
                projected_daily,
                self.config.daily_budget_usd,
            ));
        }

        let projected_monthly = state.monthly_spend + estimate;
        if projected_monthly > self.config.monthly_budget_usd * allowance {
            debug!(
                model = %model.id,
                projected = projected_monthly,
                budget = self.config.monthly_budget_usd,
                "Monthly budget would be exceeded"
            );
            return Err(Error::BudgetExceeded(
                "monthly".to_string(),
                projected_monthly,
                self.config.monthly_budget_usd,
            ));
        }

        Ok(())
    }

    /// Record money spent on a model
    ///
    /// Negative or non-finite amounts are ignored so spend never decreases
    /// within a period.
    pub fn record_cost(&self, model_id: &str, cost_usd: f64, task_type: Option<TaskType>) {
        if !cost_usd.is_finite() || cost_usd < 0.0 {
            warn!(model = model_id, cost = cost_usd, "Ignoring invalid cost record");
            return;
        }

        let now = (self.clock)();
        let mut state = self.current();

        state.daily_spend += cost_usd;
        state.monthly_spend += cost_usd;
        state.history.push_back(CostRecord {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now,
            model_id: model_id.to_string(),
            cost_usd,
            task_type,
        });
        while state.history.len() > MAX_HISTORY {
            state.history.pop_front();
        }

        debug!(
            model = model_id,
            cost = cost_usd,
            daily = state.daily_spend,
            monthly = state.monthly_spend,
            "Recorded cost"
        );
    }

    pub fn daily_spend(&self) -> f64 {
        self.current().daily_spend
    }

    pub fn monthly_spend(&self) -> f64 {
        self.current().monthly_spend
    }

    pub fn remaining_daily_budget(&self) -> f64 {
        (self.config.daily_budget_usd - self.daily_spend()).max(0.0)
    }

    pub fn remaining_monthly_budget(&self) -> f64 {
        (self.config.monthly_budget_usd - self.monthly_spend()).max(0.0)
    }

    /// The most recent `limit` records, oldest first
    pub fn spend_history(&self, limit: usize) -> Vec<CostRecord> {
        let state = self.current();
        let skip = state.history.len().saturating_sub(limit);
        state.history.iter().skip(skip).cloned().collect()
    }

    /// Spend summary against budgets
    pub fn stats(&self) -> CostStats {
        let state = self.current();
        let count = state.history.len();
        let total: f64 = state.history.iter().map(|r| r.cost_usd).sum();

        CostStats {
            daily_spend_usd: state.daily_spend,
            monthly_spend_usd: state.monthly_spend,
            daily_budget_usd: self.config.daily_budget_usd,
            monthly_budget_usd: self.config.monthly_budget_usd,
            daily_remaining_usd: (self.config.daily_budget_usd - state.daily_spend).max(0.0),
            monthly_remaining_usd: (self.config.monthly_budget_usd - state.monthly_spend)
                .max(0.0),
            transaction_count: count,
            average_cost_usd: if count > 0 { total / count as f64 } else { 0.0 },
        }
    }

    /// First model in the hierarchy that fits the task and is cheaper than
    /// `current_model_id`
    pub fn cost_effective_alternative(&self, task: &Task, current_model_id: &str) -> Result<String> {
        self.cost_effective_alternative_among(task, current_model_id, |_| true)
    }

    /// Like [`cost_effective_alternative`](Self::cost_effective_alternative),
    /// considering only models accepted by `allowed`
    pub fn cost_effective_alternative_among<F>(
        &self,
        task: &Task,
        current_model_id: &str,
        allowed: F,
    ) -> Result<String>
    where
        F: Fn(&str) -> bool,
    {
        let current = self
            .registry
            .get(current_model_id)
            .ok_or_else(|| Error::ModelNotFound(current_model_id.to_string()))?;
        let current_cost = self.estimate_task_cost(task, current);

        self.registry
            .hierarchy()
            .iter()
            .filter(|id| id.as_str() != current_model_id && allowed(id))
            .filter_map(|id| self.registry.get(id))
            .filter(|model| model.meets_hard_requirements(task))
            .find(|model| self.estimate_task_cost(task, model) < current_cost)
            .map(|model| model.id.clone())
            .ok_or_else(|| {
                Error::NoSuitableModel(format!(
                    "no cheaper model than '{}' meets the task requirements",
                    current_model_id
                ))
            })
    }
}
