//! Error types for Modelgate

use thiserror::Error;

/// Result type alias using Modelgate's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Modelgate error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Catalog errors (E001-E099)
    #[error("Model '{0}' not found. Run `modelgate models list` to see the catalog.")]
    ModelNotFound(String),

    #[error("Unknown provider '{0}'. Known providers: openrouter, openai, anthropic, gemini, grok, ollama, lmstudio.")]
    UnknownProvider(String),

    // Provider errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("LLM API error: {0}")]
    LLMError(String),

    #[error("Rate limited. Waiting {0} seconds before retry.")]
    RateLimited(u64),

    #[error("Provider call failed after {0} attempts: {1}")]
    RetriesExhausted(u32, String),

    #[error("Provider '{0}' is not available (missing API key or connection).")]
    ProviderUnavailable(String),

    // Cost errors (E200-E299)
    #[error("Would exceed {0} budget: ${1:.2} / ${2:.2}")]
    BudgetExceeded(String, f64, f64),

    // Routing errors (E300-E399)
    #[error("No suitable model: {0}")]
    NoSuitableModel(String),

    #[error("All models failed or exceeded budget")]
    AllCandidatesExhausted,

    // Fallback errors (E400-E499)
    #[error("Primary provider failed and no fallback available: {0}")]
    FallbackUnavailable(String),

    #[error("All providers failed: primary={primary}, fallback={fallback}")]
    FallbackFailed { primary: String, fallback: String },

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::ModelNotFound(_) => "E001",
            Self::UnknownProvider(_) => "E002",
            Self::NetworkError(_) => "E100",
            Self::LLMError(_) => "E101",
            Self::RateLimited(_) => "E102",
            Self::RetriesExhausted(..) => "E103",
            Self::ProviderUnavailable(_) => "E104",
            Self::BudgetExceeded(..) => "E200",
            Self::NoSuitableModel(_) => "E300",
            Self::AllCandidatesExhausted => "E301",
            Self::FallbackUnavailable(_) => "E400",
            Self::FallbackFailed { .. } => "E401",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Other(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::ModelNotFound(_) => Some("modelgate models list".to_string()),
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::ProviderUnavailable(name) => Some(format!(
                "Set the API key for '{}' or start the local server, then run `modelgate providers`",
                name
            )),
            Self::BudgetExceeded(period, _, budget) => Some(format!(
                "modelgate config set cost.{}_budget_usd {:.2}",
                period,
                budget * 1.5
            )),
            Self::NoSuitableModel(_) => Some("modelgate config list".to_string()),
            _ => None,
        }
    }

    /// Whether the error came from a single provider attempt and may succeed on retry
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkError(_) | Self::LLMError(_) | Self::RateLimited(_)
        )
    }
}
