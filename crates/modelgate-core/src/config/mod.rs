//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::{ProviderKind, RetryPolicy};
use crate::routing::{ModelRegistry, TaskType};

/// Modelgate configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub cost: CostConfig,
    pub routing: RoutingConfig,
    pub prompts: PromptConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Never written; read only so a key placed in the file can be rejected
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Primary provider (openrouter, openai, anthropic, gemini, grok, ollama, lmstudio)
    pub provider: String,
    pub default_max_tokens: u32,
    pub default_temperature: f32,
    pub default_top_p: f32,
    pub max_retries: u32,
    pub retry_backoff_secs: u64,
    pub timeout_secs: u64,
    pub ollama_base_url: String,
    pub lmstudio_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    pub daily_budget_usd: f64,
    pub monthly_budget_usd: f64,
    /// Fraction a projection may exceed a budget before it is refused
    pub overage_tolerance: f64,
    /// Per-task ceiling for consciousness-framed generations
    pub consciousness_budget_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub primary_model: String,
    pub secondary_model: String,
    pub tertiary_model: String,
    /// Models that are routable without being assigned to a task type
    pub additional_models: Vec<String>,
    /// Task type (snake_case) to preferred model
    pub task_models: BTreeMap<String, String>,
    /// Cost (USD) at which the cost-efficiency fitness term reaches zero
    /// when a task sets no budget of its own
    pub reference_max_cost_usd: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    pub system_prompt_path: Option<PathBuf>,
    pub enable_memory_context: bool,
    pub max_context_memories: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: "openrouter".to_string(),
            default_max_tokens: 2000,
            default_temperature: 0.7,
            default_top_p: 0.9,
            max_retries: 3,
            retry_backoff_secs: 1,
            timeout_secs: 60,
            ollama_base_url: "http://localhost:11434".to_string(),
            lmstudio_base_url: "http://localhost:1234/v1".to_string(),
        }
    }
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            daily_budget_usd: 33.33,
            monthly_budget_usd: 1000.0,
            overage_tolerance: 0.10,
            consciousness_budget_usd: 0.50,
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let task_models = [
            (TaskType::ConsciousReasoning, "anthropic/claude-3-opus"),
            (TaskType::Operational, "anthropic/claude-3-sonnet"),
            (TaskType::RealTime, "anthropic/claude-3-haiku"),
            (TaskType::Strategic, "google/gemini-pro-1.5"),
            (TaskType::Tactical, "cohere/command-r-plus"),
            (TaskType::Analytical, "qwen/qwen-2-72b-instruct"),
            (TaskType::Emotional, "anthropic/claude-3-sonnet"),
            (TaskType::VoiceProcessing, "anthropic/claude-3-haiku"),
        ]
        .into_iter()
        .map(|(task, model)| (task.to_string(), model.to_string()))
        .collect();

        Self {
            primary_model: "anthropic/claude-3-sonnet".to_string(),
            secondary_model: "mistralai/mixtral-8x22b".to_string(),
            tertiary_model: "meta-llama/llama-3-70b-instruct".to_string(),
            additional_models: vec!["openai/gpt-4-turbo".to_string()],
            task_models,
            reference_max_cost_usd: 1.0,
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            system_prompt_path: None,
            enable_memory_context: true,
            max_context_memories: 10,
        }
    }
}

impl LlmConfig {
    /// The configured primary provider kind
    pub fn provider_kind(&self) -> anyhow::Result<ProviderKind> {
        self.provider
            .parse()
            .map_err(|e: crate::Error| anyhow!(e.to_string()))
    }

    /// Retry policy for provider calls
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_secs(self.retry_backoff_secs),
        )
    }

    /// API key for a provider kind, read from its environment variable
    pub fn api_key_for(&self, kind: ProviderKind) -> Option<String> {
        kind.api_key_env()
            .and_then(|var| env::var(var).ok())
            .filter(|key| !key.trim().is_empty())
    }

    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;
        Ok(self.api_key_for(self.provider_kind()?))
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key()
            .map(|opt| opt.map(|key| redact_key(&key)))
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "LLM API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

impl RoutingConfig {
    /// Every model id that routing is allowed to use
    pub fn configured_models(&self) -> BTreeSet<String> {
        let mut models = BTreeSet::new();
        models.insert(self.primary_model.clone());
        models.insert(self.secondary_model.clone());
        models.insert(self.tertiary_model.clone());
        models.extend(self.additional_models.iter().cloned());
        models.extend(self.task_models.values().cloned());
        models.retain(|m| !m.is_empty());
        models
    }

    pub fn is_model_configured(&self, model_id: &str) -> bool {
        self.configured_models().contains(model_id)
    }

    /// Preferred model for a task type, falling back to the primary model
    pub fn model_for_task(&self, task_type: TaskType) -> &str {
        self.task_models
            .get(task_type.as_str())
            .map(String::as_str)
            .unwrap_or(&self.primary_model)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("MODELGATE_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("modelgate")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file (or defaults) and apply environment overrides
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file, or defaults if it doesn't exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        self.save_to(&Self::config_path()?)
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        self.validate()?;

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Apply `MODELGATE_*` overrides using the given variable lookup
    ///
    /// Unparseable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup("MODELGATE_PROVIDER") {
            if provider.parse::<ProviderKind>().is_ok() {
                self.llm.provider = provider.to_lowercase();
            } else {
                tracing::warn!(value = %provider, "Ignoring invalid MODELGATE_PROVIDER");
            }
        }

        fn parsed<T: std::str::FromStr>(
            lookup: &impl Fn(&str) -> Option<String>,
            key: &str,
        ) -> Option<T> {
            let raw = lookup(key)?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(key = key, value = %raw, "Ignoring unparseable override");
                    None
                }
            }
        }

        if let Some(v) = parsed::<f64>(&lookup, "MODELGATE_DAILY_BUDGET").filter(|v| *v >= 0.0) {
            self.cost.daily_budget_usd = v;
        }
        if let Some(v) = parsed::<f64>(&lookup, "MODELGATE_MONTHLY_BUDGET").filter(|v| *v >= 0.0) {
            self.cost.monthly_budget_usd = v;
        }
        if let Some(v) = parsed::<u32>(&lookup, "MODELGATE_MAX_RETRIES") {
            self.llm.max_retries = v;
        }
        if let Some(v) = parsed::<u32>(&lookup, "MODELGATE_MAX_TOKENS") {
            self.llm.default_max_tokens = v;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.enforce_env_only()?;
        self.llm.provider_kind()?;

        if !(0.0..=2.0).contains(&self.llm.default_temperature) {
            return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
        }
        if !(0.0..=1.0).contains(&self.llm.default_top_p) {
            return Err(anyhow!("Top-p must be between 0.0 and 1.0"));
        }
        if self.cost.daily_budget_usd < 0.0 || self.cost.monthly_budget_usd < 0.0 {
            return Err(anyhow!("Budgets must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.cost.overage_tolerance) {
            return Err(anyhow!("Overage tolerance must be between 0.0 and 1.0"));
        }
        if self.routing.reference_max_cost_usd <= 0.0 {
            return Err(anyhow!("Reference max cost must be positive"));
        }
        for task in self.routing.task_models.keys() {
            task.parse::<TaskType>().map_err(|e| anyhow!(e))?;
        }

        ModelRegistry::with_defaults().validate()?;
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        if let Some(task) = key.strip_prefix("routing.task_models.") {
            let task_type: TaskType = task.parse().map_err(|e: String| anyhow!(e))?;
            return Ok(self.routing.model_for_task(task_type).to_string());
        }

        match key {
            // LLM settings
            "llm.provider" => Ok(self.llm.provider.clone()),
            "llm.default_max_tokens" => Ok(self.llm.default_max_tokens.to_string()),
            "llm.default_temperature" => Ok(self.llm.default_temperature.to_string()),
            "llm.default_top_p" => Ok(self.llm.default_top_p.to_string()),
            "llm.max_retries" => Ok(self.llm.max_retries.to_string()),
            "llm.retry_backoff_secs" => Ok(self.llm.retry_backoff_secs.to_string()),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),
            "llm.ollama_base_url" => Ok(self.llm.ollama_base_url.clone()),
            "llm.lmstudio_base_url" => Ok(self.llm.lmstudio_base_url.clone()),

            // Cost settings
            "cost.daily_budget_usd" => Ok(self.cost.daily_budget_usd.to_string()),
            "cost.monthly_budget_usd" => Ok(self.cost.monthly_budget_usd.to_string()),
            "cost.overage_tolerance" => Ok(self.cost.overage_tolerance.to_string()),
            "cost.consciousness_budget_usd" => {
                Ok(self.cost.consciousness_budget_usd.to_string())
            }

            // Routing settings
            "routing.primary_model" => Ok(self.routing.primary_model.clone()),
            "routing.secondary_model" => Ok(self.routing.secondary_model.clone()),
            "routing.tertiary_model" => Ok(self.routing.tertiary_model.clone()),
            "routing.additional_models" => Ok(self.routing.additional_models.join(", ")),
            "routing.reference_max_cost_usd" => {
                Ok(self.routing.reference_max_cost_usd.to_string())
            }

            // Prompt settings
            "prompts.system_prompt_path" => Ok(self
                .prompts
                .system_prompt_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(built-in)".to_string())),
            "prompts.enable_memory_context" => Ok(self.prompts.enable_memory_context.to_string()),
            "prompts.max_context_memories" => Ok(self.prompts.max_context_memories.to_string()),

            // API key (special handling - show redacted)
            "llm.api_key" | "api_key" => match self.llm.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => {
                    let var = self
                        .llm
                        .provider_kind()?
                        .api_key_env()
                        .unwrap_or("(none required)");
                    Ok(format!("(not set - use {} env var)", var))
                }
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `modelgate config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        if let Some(task) = key.strip_prefix("routing.task_models.") {
            let task_type: TaskType = task.parse().map_err(|e: String| anyhow!(e))?;
            self.routing
                .task_models
                .insert(task_type.to_string(), value.trim().to_string());
            return Ok(());
        }

        match key {
            // LLM settings
            "llm.provider" => {
                let kind: ProviderKind = value
                    .parse()
                    .map_err(|e: crate::Error| anyhow!(e.to_string()))?;
                self.llm.provider = kind.to_string();
            }
            "llm.default_max_tokens" => {
                self.llm.default_max_tokens = value
                    .parse()
                    .with_context(|| format!("Invalid default_max_tokens value: {}", value))?;
            }
            "llm.default_temperature" => {
                let temp: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid temperature value: {}", value))?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.llm.default_temperature = temp;
            }
            "llm.default_top_p" => {
                let top_p: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid top_p value: {}", value))?;
                if !(0.0..=1.0).contains(&top_p) {
                    return Err(anyhow!("Top-p must be between 0.0 and 1.0"));
                }
                self.llm.default_top_p = top_p;
            }
            "llm.max_retries" => {
                self.llm.max_retries = value
                    .parse()
                    .with_context(|| format!("Invalid max_retries value: {}", value))?;
            }
            "llm.retry_backoff_secs" => {
                self.llm.retry_backoff_secs = value
                    .parse()
                    .with_context(|| format!("Invalid retry_backoff_secs value: {}", value))?;
            }
            "llm.timeout_secs" => {
                self.llm.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }
            "llm.ollama_base_url" => self.llm.ollama_base_url = value.to_string(),
            "llm.lmstudio_base_url" => self.llm.lmstudio_base_url = value.to_string(),

            // Cost settings
            "cost.daily_budget_usd" => {
                self.cost.daily_budget_usd = parse_amount(key, value)?;
            }
            "cost.monthly_budget_usd" => {
                self.cost.monthly_budget_usd = parse_amount(key, value)?;
            }
            "cost.consciousness_budget_usd" => {
                self.cost.consciousness_budget_usd = parse_amount(key, value)?;
            }
            "cost.overage_tolerance" => {
                let tolerance: f64 = value
                    .parse()
                    .with_context(|| format!("Invalid overage_tolerance value: {}", value))?;
                if !(0.0..=1.0).contains(&tolerance) {
                    return Err(anyhow!("Overage tolerance must be between 0.0 and 1.0"));
                }
                self.cost.overage_tolerance = tolerance;
            }

            // Routing settings
            "routing.primary_model" => self.routing.primary_model = value.to_string(),
            "routing.secondary_model" => self.routing.secondary_model = value.to_string(),
            "routing.tertiary_model" => self.routing.tertiary_model = value.to_string(),
            "routing.additional_models" => {
                self.routing.additional_models = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
            }
            "routing.reference_max_cost_usd" => {
                let cost = parse_amount(key, value)?;
                if cost == 0.0 {
                    return Err(anyhow!("Reference max cost must be positive"));
                }
                self.routing.reference_max_cost_usd = cost;
            }

            // Prompt settings
            "prompts.system_prompt_path" => {
                self.prompts.system_prompt_path = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                };
            }
            "prompts.enable_memory_context" => {
                self.prompts.enable_memory_context = value
                    .parse()
                    .with_context(|| format!("Invalid boolean value: {}", value))?;
            }
            "prompts.max_context_memories" => {
                self.prompts.max_context_memories = value
                    .parse()
                    .with_context(|| format!("Invalid max_context_memories value: {}", value))?;
            }

            // API key cannot be set via config
            "llm.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the provider's API key environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `modelgate config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let mut keys: Vec<String> = [
            "llm.provider",
            "llm.default_max_tokens",
            "llm.default_temperature",
            "llm.default_top_p",
            "llm.max_retries",
            "llm.retry_backoff_secs",
            "llm.timeout_secs",
            "llm.ollama_base_url",
            "llm.lmstudio_base_url",
            "llm.api_key",
            "cost.daily_budget_usd",
            "cost.monthly_budget_usd",
            "cost.overage_tolerance",
            "cost.consciousness_budget_usd",
            "routing.primary_model",
            "routing.secondary_model",
            "routing.tertiary_model",
            "routing.additional_models",
            "routing.reference_max_cost_usd",
            "prompts.system_prompt_path",
            "prompts.enable_memory_context",
            "prompts.max_context_memories",
        ]
        .iter()
        .map(|k| k.to_string())
        .collect();
        keys.extend(
            TaskType::ALL
                .iter()
                .map(|t| format!("routing.task_models.{}", t)),
        );

        keys.into_iter()
            .map(|key| {
                let value = self.get(&key)?;
                Ok((key, value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

/// Mask all but the last four characters of a key
fn redact_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        "***".to_string()
    } else {
        let suffix: String = chars[chars.len() - 4..].iter().collect();
        format!("***{}", suffix)
    }
}

fn parse_amount(key: &str, value: &str) -> anyhow::Result<f64> {
    let amount: f64 = value
        .parse()
        .with_context(|| format!("Invalid {} value: {}", key, value))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(anyhow!("{} must be non-negative", key));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_validate() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.llm.max_retries, 3);
        assert!((config.routing.reference_max_cost_usd - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_configured_models_union() {
        let routing = RoutingConfig::default();
        let models = routing.configured_models();

        assert!(models.contains("anthropic/claude-3-sonnet"));
        assert!(models.contains("openai/gpt-4-turbo"));
        assert!(models.contains("qwen/qwen-2-72b-instruct"));
        assert!(!models.contains("openai/gpt-4-vision-preview"));
        assert!(routing.is_model_configured("cohere/command-r-plus"));
    }

    #[test]
    fn test_model_for_task_falls_back_to_primary() {
        let mut routing = RoutingConfig::default();
        assert_eq!(
            routing.model_for_task(TaskType::RealTime),
            "anthropic/claude-3-haiku"
        );

        routing.task_models.remove("real_time");
        assert_eq!(
            routing.model_for_task(TaskType::RealTime),
            routing.primary_model
        );
    }

    #[test]
    fn test_set_and_get_round_trip_keys() {
        let mut config = Config::default();

        config.set("cost.daily_budget_usd", "12.5").unwrap();
        config.set("llm.provider", "Ollama").unwrap();
        config.set("routing.task_models.tactical", "openai/gpt-4-turbo").unwrap();
        config.set("routing.additional_models", "a/b, c/d,").unwrap();

        assert_eq!(config.get("cost.daily_budget_usd").unwrap(), "12.5");
        assert_eq!(config.get("llm.provider").unwrap(), "ollama");
        assert_eq!(
            config.get("routing.task_models.tactical").unwrap(),
            "openai/gpt-4-turbo"
        );
        assert_eq!(config.routing.additional_models, vec!["a/b", "c/d"]);
    }

    #[test]
    fn test_set_rejects_invalid_values() {
        let mut config = Config::default();

        assert!(config.set("llm.default_temperature", "3.0").is_err());
        assert!(config.set("cost.overage_tolerance", "1.5").is_err());
        assert!(config.set("cost.monthly_budget_usd", "-1").is_err());
        assert!(config.set("llm.provider", "carrier-pigeon").is_err());
        assert!(config.set("routing.task_models.dreaming", "a/b").is_err());
        assert!(config.set("llm.api_key", "sk-secret").is_err());
        assert!(config.set("no.such.key", "1").is_err());
    }

    #[test]
    fn test_list_covers_task_models() {
        let config = Config::default();
        let items = config.list().unwrap();
        assert!(items.iter().any(|(k, _)| k == "routing.task_models.voice_processing"));
        assert!(items.iter().any(|(k, _)| k == "cost.overage_tolerance"));
    }

    #[test]
    fn test_env_only_api_keys() {
        let mut config = Config::default();
        config.llm.api_key = Some("sk-inline".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_key_in_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[llm]\nprovider = \"openrouter\"\napi_key = \"sk-or-leaked-secret\"\n",
        )
        .unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("environment variables"));
    }

    #[test]
    fn test_saved_file_never_contains_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config::default().save_to(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.contains("api_key"));
        assert!(Config::load_from(&path).is_ok());
    }

    #[test]
    fn test_redact_key_keeps_last_four_chars() {
        assert_eq!(redact_key("sk-abcdef"), "***cdef");
        assert_eq!(redact_key("sk-clé-ñañaé"), "***añaé");
        assert_eq!(redact_key("ключ"), "***");
    }

    #[test]
    fn test_apply_overrides() {
        let vars: HashMap<&str, &str> = [
            ("MODELGATE_PROVIDER", "anthropic"),
            ("MODELGATE_DAILY_BUDGET", "5"),
            ("MODELGATE_MONTHLY_BUDGET", "not-a-number"),
            ("MODELGATE_MAX_RETRIES", "7"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.llm.provider, "anthropic");
        assert!((config.cost.daily_budget_usd - 5.0).abs() < f64::EPSILON);
        assert!((config.cost.monthly_budget_usd - 1000.0).abs() < f64::EPSILON);
        assert_eq!(config.llm.max_retries, 7);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.set("cost.monthly_budget_usd", "250").unwrap();
        config.set("prompts.max_context_memories", "3").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!((loaded.cost.monthly_budget_usd - 250.0).abs() < f64::EPSILON);
        assert_eq!(loaded.prompts.max_context_memories, 3);
        assert_eq!(loaded.routing.task_models, config.routing.task_models);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[cost]\ndaily_budget_usd = 2.0\n").unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert!((loaded.cost.daily_budget_usd - 2.0).abs() < f64::EPSILON);
        assert_eq!(loaded.llm.provider, "openrouter");
        assert_eq!(loaded.llm.default_max_tokens, 2000);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(loaded.llm.provider, "openrouter");
    }
}
