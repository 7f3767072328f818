//! Provider-level fallback
//!
//! The fallback manager owns an ordered chain of provider names. When a
//! whole backend fails it finds the next healthy provider in the chain and
//! retries the request there once.

use std::cmp::Ordering;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::health::HealthMonitor;
use crate::llm::{LlmResponse, Message, Provider, ProviderFactory, ProviderKind};

/// Score given to a provider with no observed requests
const NEUTRAL_SUCCESS_RATE: f64 = 0.5;

/// Ordered provider substitution driven by health
pub struct FallbackManager {
    chain: RwLock<Vec<String>>,
    health: Arc<HealthMonitor>,
    factory: Arc<dyn ProviderFactory>,
}

impl std::fmt::Debug for FallbackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackManager")
            .field("chain", &self.fallback_chain())
            .finish_non_exhaustive()
    }
}

impl FallbackManager {
    /// Chain seeded with `primary`, then every known kind in preference order
    pub fn new(
        primary: &str,
        health: Arc<HealthMonitor>,
        factory: Arc<dyn ProviderFactory>,
    ) -> Self {
        let mut chain = vec![primary.to_string()];
        chain.extend(
            ProviderKind::ALL
                .iter()
                .map(|k| k.as_str().to_string())
                .filter(|name| name != primary),
        );
        Self::with_chain(chain, health, factory)
    }

    /// Use an explicit chain
    pub fn with_chain(
        chain: Vec<String>,
        health: Arc<HealthMonitor>,
        factory: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            chain: RwLock::new(chain),
            health,
            factory,
        }
    }

    /// Current preference order
    pub fn fallback_chain(&self) -> Vec<String> {
        self.chain.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Next usable provider after `current` in the chain
    ///
    /// Providers the health monitor reports as down are skipped without a
    /// check; the rest are checked in order. If `current` is not in the chain
    /// the scan starts from the beginning.
    pub async fn get_next_provider(&self, current: &str) -> Result<Arc<dyn Provider>> {
        let chain = self.fallback_chain();
        let start = chain
            .iter()
            .position(|name| name == current)
            .map(|i| i + 1)
            .unwrap_or(0);

        for name in chain.iter().skip(start).filter(|name| *name != current) {
            if let Some(health) = self.health.get_health(name)
                && !health.available
            {
                debug!(provider = %name, "Skipping unavailable provider");
                continue;
            }

            let provider = match self.factory.create(name) {
                Ok(provider) => provider,
                Err(e) => {
                    debug!(provider = %name, error = %e, "Could not construct provider");
                    continue;
                }
            };

            if provider.is_available().await {
                info!(from = current, to = %name, "Selected fallback provider");
                return Ok(provider);
            }
            debug!(provider = %name, "Fallback candidate failed liveness check");
        }

        Err(Error::ProviderUnavailable(format!(
            "no fallback provider available after '{}'",
            current
        )))
    }

    /// Call `primary`, falling back once to the next healthy provider
    pub async fn try_with_fallback(
        &self,
        primary: &dyn Provider,
        model_id: &str,
        messages: &[Message],
        max_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let primary_error = match self
            .call_recording(primary, model_id, messages, max_tokens, temperature)
            .await
        {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        warn!(provider = primary.name(), error = %primary_error, "Primary provider failed");

        let fallback = match self.get_next_provider(primary.name()).await {
            Ok(provider) => provider,
            Err(e) => {
                debug!(error = %e, "No fallback provider");
                return Err(Error::FallbackUnavailable(primary_error.to_string()));
            }
        };

        self.call_recording(fallback.as_ref(), model_id, messages, max_tokens, temperature)
            .await
            .map_err(|fallback_error| Error::FallbackFailed {
                primary: primary_error.to_string(),
                fallback: fallback_error.to_string(),
            })
    }

    async fn call_recording(
        &self,
        provider: &dyn Provider,
        model_id: &str,
        messages: &[Message],
        max_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<LlmResponse> {
        let started = Instant::now();
        let result = provider
            .call_with_retry(model_id, messages, max_tokens, temperature)
            .await;

        match &result {
            Ok(response) => {
                self.health
                    .update_health(provider.name(), true, response.response_time)
            }
            Err(_) => self
                .health
                .update_health(provider.name(), false, started.elapsed()),
        }
        result
    }

    /// Re-rank the chain from observed health
    ///
    /// Score is 1 for an available provider plus its success rate (0.5 when
    /// never observed). Ties are broken by name.
    pub fn update_fallback_order(&self) {
        let health = self.health.get_all_health();
        let mut chain = self.chain.write().unwrap_or_else(|e| e.into_inner());

        let score = |name: &str| -> f64 {
            match health.get(name) {
                Some(h) => {
                    let available = if h.available { 1.0 } else { 0.0 };
                    available + h.success_rate().unwrap_or(NEUTRAL_SUCCESS_RATE)
                }
                None => NEUTRAL_SUCCESS_RATE,
            }
        };

        let mut scored: Vec<(f64, String)> = chain.iter().map(|n| (score(n), n.clone())).collect();
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });

        *chain = scored.into_iter().map(|(_, name)| name).collect();
        info!(chain = ?*chain, "Fallback order updated");
    }
}
