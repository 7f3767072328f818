//! Scripted in-memory providers for unit tests

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::llm::{
    FinishReason, LlmResponse, Message, Provider, ProviderFactory, RetryPolicy, TokenUsage,
};

/// A provider that replays scripted outcomes
///
/// Once the script runs out, every call uses the fallback outcome.
pub struct ScriptedProvider {
    name: String,
    available: AtomicBool,
    script: Mutex<VecDeque<bool>>,
    succeed_by_default: bool,
    failing_models: Vec<String>,
    calls: Mutex<Vec<String>>,
    retry: RetryPolicy,
}

impl ScriptedProvider {
    fn new(name: &str, succeed_by_default: bool) -> Self {
        Self {
            name: name.to_string(),
            available: AtomicBool::new(true),
            script: Mutex::new(VecDeque::new()),
            succeed_by_default,
            failing_models: Vec::new(),
            calls: Mutex::new(Vec::new()),
            retry: RetryPolicy::new(1, Duration::ZERO),
        }
    }

    pub fn succeeding(name: &str) -> Self {
        Self::new(name, true)
    }

    pub fn failing(name: &str) -> Self {
        Self::new(name, false)
    }

    pub fn unavailable(self) -> Self {
        self.available.store(false, Ordering::SeqCst);
        self
    }

    /// Outcomes for the next calls, in order
    pub fn with_script(self, outcomes: &[bool]) -> Self {
        self.script.lock().unwrap().extend(outcomes.iter().copied());
        self
    }

    /// Calls for these models always fail
    pub fn failing_for(mut self, models: &[&str]) -> Self {
        self.failing_models = models.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Model ids passed to `call`, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(
        &self,
        model_id: &str,
        _messages: &[Message],
        _max_tokens: u32,
        _temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        self.calls.lock().unwrap().push(model_id.to_string());

        let scripted = self.script.lock().unwrap().pop_front();
        let succeed = scripted.unwrap_or(self.succeed_by_default)
            && !self.failing_models.iter().any(|m| m == model_id);

        if succeed {
            Ok(LlmResponse {
                content: format!("{} answered with {}", self.name, model_id),
                model: model_id.to_string(),
                usage: TokenUsage::new(10, 20),
                cost_usd: 0.01,
                response_time: Duration::from_millis(5),
                finish_reason: FinishReason::Stop,
            })
        } else {
            Err(Error::LLMError(format!("{} refused {}", self.name, model_id)))
        }
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }
}

/// Factory handing out pre-built providers by name
#[derive(Default)]
pub struct MapFactory {
    providers: HashMap<String, Arc<ScriptedProvider>>,
}

impl MapFactory {
    pub fn with(mut self, provider: Arc<ScriptedProvider>) -> Self {
        self.providers.insert(provider.name().to_string(), provider);
        self
    }
}

impl ProviderFactory for MapFactory {
    fn create(&self, name: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .get(name)
            .cloned()
            .map(|p| p as Arc<dyn Provider>)
            .ok_or_else(|| Error::UnknownProvider(name.to_string()))
    }
}
