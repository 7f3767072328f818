//! Types for cost-governed model routing
//!
//! This module defines the closed data model the router works with: the
//! task being answered, the catalogued models it can be answered by, and the
//! per-model performance history that feeds back into scoring.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Kind of work a task represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Deep, reflective reasoning
    ConsciousReasoning,
    /// Everyday operational requests
    Operational,
    /// Latency-sensitive interaction
    RealTime,
    /// Long-horizon planning
    Strategic,
    /// Concrete actions, usually with tools
    Tactical,
    /// Data and text analysis
    Analytical,
    /// Emotionally expressive writing
    Emotional,
    /// Speech pipelines
    VoiceProcessing,
}

impl TaskType {
    /// All task types, in declaration order
    pub const ALL: [TaskType; 8] = [
        Self::ConsciousReasoning,
        Self::Operational,
        Self::RealTime,
        Self::Strategic,
        Self::Tactical,
        Self::Analytical,
        Self::Emotional,
        Self::VoiceProcessing,
    ];

    /// Stable string form, matching the serde representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConsciousReasoning => "conscious_reasoning",
            Self::Operational => "operational",
            Self::RealTime => "real_time",
            Self::Strategic => "strategic",
            Self::Tactical => "tactical",
            Self::Analytical => "analytical",
            Self::Emotional => "emotional",
            Self::VoiceProcessing => "voice_processing",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Unknown task type: {}", s))
    }
}

/// Capability flags a task asks of its model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Requirements {
    pub reasoning: bool,
    pub creativity: bool,
    pub speed: bool,
    pub tool_use: bool,
}

impl Requirements {
    /// Requirement flags implied by a task type
    pub fn for_task_type(task_type: TaskType) -> Self {
        Self {
            reasoning: matches!(
                task_type,
                TaskType::ConsciousReasoning | TaskType::Strategic
            ),
            creativity: matches!(
                task_type,
                TaskType::Emotional | TaskType::ConsciousReasoning
            ),
            speed: matches!(task_type, TaskType::RealTime | TaskType::VoiceProcessing),
            tool_use: matches!(task_type, TaskType::Tactical),
        }
    }
}

/// A single request for generated text
///
/// Built through [`TaskBuilder`], which validates the inputs; a task is not
/// modified after construction.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    task_type: TaskType,
    prompt: String,
    context_length: usize,
    requirements: Requirements,
    max_tokens: u32,
    temperature: f32,
    budget_usd: f64,
}

impl Task {
    /// Start building a task of the given type
    pub fn builder(task_type: TaskType, prompt: impl Into<String>) -> TaskBuilder {
        TaskBuilder::new(task_type, prompt)
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    /// Context window (in tokens) the task needs
    pub fn context_length(&self) -> usize {
        self.context_length
    }

    pub fn requirements(&self) -> Requirements {
        self.requirements
    }

    /// Completion budget in tokens; 0 means the configured default
    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Hard cost ceiling in USD; 0 means ambient budget rules only
    pub fn budget_usd(&self) -> f64 {
        self.budget_usd
    }

    /// Whether an explicit per-task ceiling is set
    pub fn has_budget(&self) -> bool {
        self.budget_usd > 0.0
    }
}

/// Builder for [`Task`]
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    task_type: TaskType,
    prompt: String,
    context_length: Option<usize>,
    requirements: Option<Requirements>,
    max_tokens: u32,
    temperature: f32,
    budget_usd: f64,
}

impl TaskBuilder {
    /// Create a new builder
    pub fn new(task_type: TaskType, prompt: impl Into<String>) -> Self {
        Self {
            task_type,
            prompt: prompt.into(),
            context_length: None,
            requirements: None,
            max_tokens: 0,
            temperature: 0.7,
            budget_usd: 0.0,
        }
    }

    /// Override the required context length (defaults to the prompt length)
    pub fn context_length(mut self, tokens: usize) -> Self {
        self.context_length = Some(tokens);
        self
    }

    /// Override the requirement flags derived from the task type
    pub fn requirements(mut self, requirements: Requirements) -> Self {
        self.requirements = Some(requirements);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set a hard cost ceiling in USD (0 disables it)
    pub fn budget_usd(mut self, budget: f64) -> Self {
        self.budget_usd = budget;
        self
    }

    /// Validate and build the task
    pub fn build(self) -> Result<Task> {
        if self.prompt.trim().is_empty() {
            return Err(Error::InvalidInput("task prompt is empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::InvalidInput(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        if !self.budget_usd.is_finite() || self.budget_usd < 0.0 {
            return Err(Error::InvalidInput(format!(
                "task budget {} must be a non-negative amount",
                self.budget_usd
            )));
        }

        let context_length = self.context_length.unwrap_or(self.prompt.len());

        Ok(Task {
            task_type: self.task_type,
            requirements: self
                .requirements
                .unwrap_or_else(|| Requirements::for_task_type(self.task_type)),
            prompt: self.prompt,
            context_length,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            budget_usd: self.budget_usd,
        })
    }
}

/// What a model is good at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    pub reasoning: bool,
    pub creativity: bool,
    pub speed: bool,
    pub tool_use: bool,
    pub multimodal: bool,
    pub multilingual: bool,
    pub math: bool,
}

/// A catalogued model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    /// Model identifier (e.g., "anthropic/claude-3-sonnet")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Owning vendor
    pub provider: String,
    /// Maximum context window in tokens
    pub context_length: usize,
    /// Cost per million input tokens in USD
    pub input_price_per_million: f64,
    /// Cost per million output tokens in USD
    pub output_price_per_million: f64,
    pub capabilities: Capabilities,
}

impl Model {
    /// Create a model with no capabilities and zero pricing
    pub fn new(id: impl Into<String>, name: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            provider: provider.into(),
            context_length: 8_000,
            input_price_per_million: 0.0,
            output_price_per_million: 0.0,
            capabilities: Capabilities::default(),
        }
    }

    /// Set pricing (USD per million tokens)
    pub fn with_pricing(mut self, input: f64, output: f64) -> Self {
        self.input_price_per_million = input;
        self.output_price_per_million = output;
        self
    }

    pub fn with_context_length(mut self, tokens: usize) -> Self {
        self.context_length = tokens;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Cost of a call with the given token counts
    pub fn cost_for(&self, prompt_tokens: u64, completion_tokens: u64) -> f64 {
        let prompt_cost = (prompt_tokens as f64 / 1_000_000.0) * self.input_price_per_million;
        let completion_cost =
            (completion_tokens as f64 / 1_000_000.0) * self.output_price_per_million;
        prompt_cost + completion_cost
    }

    /// Whether the model satisfies the hard requirements of a task
    ///
    /// Only reasoning, tool use and context length are hard; creativity and
    /// speed are preferences that affect scoring.
    pub fn meets_hard_requirements(&self, task: &Task) -> bool {
        let required = task.requirements();
        if required.reasoning && !self.capabilities.reasoning {
            return false;
        }
        if required.tool_use && !self.capabilities.tool_use {
            return false;
        }
        self.context_length >= task.context_length()
    }
}

/// Observed reliability of a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPerformance {
    pub model_id: String,
    pub tasks_completed: u64,
    pub tasks_failed: u64,
    pub last_response_time: Option<Duration>,
    pub last_cost_usd: Option<f64>,
    /// Completed over attempted, in 0.0..=1.0
    pub reliability: f64,
}

impl ModelPerformance {
    /// Create an empty record
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            tasks_completed: 0,
            tasks_failed: 0,
            last_response_time: None,
            last_cost_usd: None,
            reliability: 0.0,
        }
    }

    /// Total attempts recorded
    pub fn attempts(&self) -> u64 {
        self.tasks_completed + self.tasks_failed
    }

    /// Record a successful attempt
    pub fn record_success(&mut self, response_time: Duration, cost_usd: f64) {
        self.tasks_completed += 1;
        self.last_response_time = Some(response_time);
        self.last_cost_usd = Some(cost_usd);
        self.recompute();
    }

    /// Record a failed attempt
    pub fn record_failure(&mut self) {
        self.tasks_failed += 1;
        self.recompute();
    }

    fn recompute(&mut self) {
        let total = self.attempts();
        if total > 0 {
            self.reliability = self.tasks_completed as f64 / total as f64;
        }
    }
}

/// A model together with its fitness for a particular task
#[derive(Debug, Clone, Serialize)]
pub struct ScoredModel {
    pub model: Model,
    pub score: f64,
    /// Estimated cost of the task on this model, in USD
    pub estimated_cost_usd: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirements_from_task_type() {
        let strategic = Requirements::for_task_type(TaskType::Strategic);
        assert!(strategic.reasoning);
        assert!(!strategic.creativity);

        let conscious = Requirements::for_task_type(TaskType::ConsciousReasoning);
        assert!(conscious.reasoning && conscious.creativity);

        let voice = Requirements::for_task_type(TaskType::VoiceProcessing);
        assert!(voice.speed);
        assert!(!voice.reasoning);

        assert!(Requirements::for_task_type(TaskType::Tactical).tool_use);
        assert_eq!(
            Requirements::for_task_type(TaskType::Operational),
            Requirements::default()
        );
    }

    #[test]
    fn test_task_type_parse() {
        assert_eq!(
            "real-time".parse::<TaskType>().unwrap(),
            TaskType::RealTime
        );
        assert_eq!(
            "VOICE_PROCESSING".parse::<TaskType>().unwrap(),
            TaskType::VoiceProcessing
        );
        assert!("telepathy".parse::<TaskType>().is_err());
        assert_eq!(TaskType::Analytical.to_string(), "analytical");
    }

    #[test]
    fn test_task_builder_defaults() {
        let task = Task::builder(TaskType::Tactical, "deploy the thing")
            .build()
            .unwrap();

        assert_eq!(task.context_length(), "deploy the thing".len());
        assert!(task.requirements().tool_use);
        assert_eq!(task.max_tokens(), 0);
        assert!(!task.has_budget());
    }

    #[test]
    fn test_task_builder_validation() {
        assert!(Task::builder(TaskType::Operational, "   ").build().is_err());
        assert!(
            Task::builder(TaskType::Operational, "hi")
                .temperature(2.5)
                .build()
                .is_err()
        );
        assert!(
            Task::builder(TaskType::Operational, "hi")
                .budget_usd(-1.0)
                .build()
                .is_err()
        );
        assert!(
            Task::builder(TaskType::Operational, "hi")
                .budget_usd(f64::NAN)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_model_cost_for() {
        let model = Model::new("test/model", "Test", "test").with_pricing(3.0, 15.0);
        let cost = model.cost_for(1_000_000, 500_000);
        assert!((cost - 10.5).abs() < 1e-9);
    }

    #[test]
    fn test_hard_requirements() {
        let task = Task::builder(TaskType::Strategic, "plan")
            .context_length(100_000)
            .build()
            .unwrap();

        let thinker = Model::new("a/thinker", "Thinker", "a")
            .with_context_length(200_000)
            .with_capabilities(Capabilities {
                reasoning: true,
                ..Default::default()
            });
        let small = thinker.clone().with_context_length(8_000);
        let shallow = Model::new("a/shallow", "Shallow", "a").with_context_length(200_000);

        assert!(thinker.meets_hard_requirements(&task));
        assert!(!small.meets_hard_requirements(&task));
        assert!(!shallow.meets_hard_requirements(&task));
    }

    #[test]
    fn test_performance_reliability() {
        let mut perf = ModelPerformance::new("test/model");
        assert_eq!(perf.reliability, 0.0);

        perf.record_failure();
        assert_eq!(perf.reliability, 0.0);

        perf.record_success(Duration::from_millis(250), 0.01);
        perf.record_success(Duration::from_millis(150), 0.02);
        perf.record_failure();

        assert_eq!(perf.attempts(), 4);
        assert!((perf.reliability - 0.5).abs() < 1e-9);
        assert_eq!(perf.last_response_time, Some(Duration::from_millis(150)));
        assert_eq!(perf.last_cost_usd, Some(0.02));
    }
}
