//! Cost-governed model routing
//!
//! The key components are:
//!
//! - **Model Registry**: Catalog of models with their capabilities, context
//!   window and pricing, plus a hand-curated capability hierarchy.
//!
//! - **Task**: A validated request with requirement flags derived from its
//!   task type and an optional hard cost ceiling.
//!
//! - **Model Router**: Scores configured models against a task and tries
//!   them best-first through the active provider.
//!
//! ## How It Works
//!
//! 1. Every configured catalog model gets a fitness score (max 135)
//! 2. Candidates are ordered by score, ties broken by model id
//! 3. Each candidate must fit the task budget and pass cost admission
//! 4. The first successful call wins; failures lower a model's reliability
//!
//! ## Example
//!
//! ```rust,ignore
//! use modelgate_core::routing::{Task, TaskType};
//!
//! let task = Task::builder(TaskType::Analytical, "Summarise the Q3 numbers")
//!     .max_tokens(500)
//!     .build()?;
//! let response = router.route_to_optimal_model(&task).await?;
//! println!("{} via {}", response.content, response.model);
//! ```

mod registry;
mod router;
mod types;

pub use registry::{ModelRegistry, resolve_model_id};
pub use router::{MAX_FITNESS, ModelRouter, RouterConfig, fitness_score};
pub use types::{
    Capabilities, Model, ModelPerformance, Requirements, ScoredModel, Task, TaskBuilder, TaskType,
};
