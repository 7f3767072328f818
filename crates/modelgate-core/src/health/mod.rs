//! Provider health tracking
//!
//! Each provider has a rolling availability record. Three consecutive
//! failures mark a provider unavailable; the next success restores it.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::llm::Provider;

/// Consecutive failures after which a provider is considered down
pub const FAILURE_THRESHOLD: u32 = 3;

/// Weight of the newest sample in the smoothed response time
const RESPONSE_TIME_WEIGHT: f64 = 0.3;

/// Availability record for one provider
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub available: bool,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    /// Exponentially smoothed response time
    pub average_response_time: Duration,
}

impl ProviderHealth {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            available: false,
            last_checked: None,
            last_success: None,
            last_failure: None,
            consecutive_failures: 0,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            average_response_time: Duration::ZERO,
        }
    }

    /// Successful over total requests, if any were observed
    pub fn success_rate(&self) -> Option<f64> {
        if self.total_requests == 0 {
            None
        } else {
            Some(self.successful_requests as f64 / self.total_requests as f64)
        }
    }

    /// Short human-readable status
    pub fn status_line(&self) -> String {
        if self.total_requests == 0 && self.last_checked.is_none() {
            return "Unknown".to_string();
        }
        if self.available {
            format!(
                "Available ({:.1}% success, avg: {:?})",
                self.success_rate().unwrap_or(0.0) * 100.0,
                self.average_response_time
            )
        } else {
            format!(
                "Unavailable ({} consecutive failures)",
                self.consecutive_failures
            )
        }
    }

    fn record(&mut self, success: bool, response_time: Duration) {
        let now = Utc::now();
        self.last_checked = Some(now);
        self.total_requests += 1;

        if success {
            self.available = true;
            self.consecutive_failures = 0;
            self.successful_requests += 1;
            self.last_success = Some(now);
            self.average_response_time = if self.successful_requests == 1 {
                response_time
            } else {
                self.average_response_time
                    .mul_f64(1.0 - RESPONSE_TIME_WEIGHT)
                    + response_time.mul_f64(RESPONSE_TIME_WEIGHT)
            };
        } else {
            self.consecutive_failures += 1;
            self.failed_requests += 1;
            self.last_failure = Some(now);
            if self.consecutive_failures >= FAILURE_THRESHOLD {
                self.available = false;
            }
        }
    }
}

/// Tracks the health of every known provider
#[derive(Debug, Default)]
pub struct HealthMonitor {
    providers: RwLock<HashMap<String, ProviderHealth>>,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensure a record exists for `name`; new records start unavailable
    pub fn register_provider(&self, name: &str) {
        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        providers
            .entry(name.to_string())
            .or_insert_with(|| ProviderHealth::new(name));
    }

    /// Fold the outcome of one request into the provider's record
    pub fn update_health(&self, name: &str, success: bool, response_time: Duration) {
        let mut providers = self.providers.write().unwrap_or_else(|e| e.into_inner());
        let health = providers
            .entry(name.to_string())
            .or_insert_with(|| ProviderHealth::new(name));

        let was_available = health.available;
        health.record(success, response_time);

        match (was_available, health.available) {
            (false, true) if health.total_requests > 1 => {
                info!(provider = name, "Provider recovered");
            }
            (true, false) => {
                warn!(
                    provider = name,
                    failures = health.consecutive_failures,
                    "Provider marked unavailable"
                );
            }
            _ => debug!(
                provider = name,
                success,
                consecutive_failures = health.consecutive_failures,
                "Health updated"
            ),
        }
    }

    /// Snapshot of one provider's record
    pub fn get_health(&self, name: &str) -> Option<ProviderHealth> {
        self.providers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Snapshot of every record
    pub fn get_all_health(&self) -> HashMap<String, ProviderHealth> {
        self.providers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Names of providers currently marked available, sorted
    pub fn get_available_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = providers
            .values()
            .filter(|h| h.available)
            .map(|h| h.name.clone())
            .collect();
        names.sort();
        names
    }

    /// Check a provider and record the outcome
    pub async fn check_provider_health(&self, provider: &dyn Provider) -> bool {
        let started = Instant::now();
        let available = provider.is_available().await;
        self.update_health(provider.name(), available, started.elapsed());
        available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_register_is_idempotent_and_unavailable() {
        let monitor = HealthMonitor::new();
        monitor.register_provider("openai");
        monitor.update_health("openai", true, MS);
        monitor.register_provider("openai");

        let health = monitor.get_health("openai").unwrap();
        assert!(health.available);
        assert_eq!(health.total_requests, 1);

        monitor.register_provider("grok");
        assert!(!monitor.get_health("grok").unwrap().available);
    }

    #[test]
    fn test_degrade_after_three_failures_and_recover() {
        let monitor = HealthMonitor::new();
        monitor.update_health("p", true, MS);

        monitor.update_health("p", false, MS);
        monitor.update_health("p", false, MS);
        assert!(monitor.get_health("p").unwrap().available);

        monitor.update_health("p", false, MS);
        let down = monitor.get_health("p").unwrap();
        assert!(!down.available);
        assert_eq!(down.consecutive_failures, 3);

        monitor.update_health("p", true, MS);
        let up = monitor.get_health("p").unwrap();
        assert!(up.available);
        assert_eq!(up.consecutive_failures, 0);
    }

    #[test]
    fn test_smoothed_response_time() {
        let monitor = HealthMonitor::new();
        monitor.update_health("p", true, Duration::from_millis(100));
        assert_eq!(
            monitor.get_health("p").unwrap().average_response_time,
            Duration::from_millis(100)
        );

        monitor.update_health("p", true, Duration::from_millis(200));
        let avg = monitor.get_health("p").unwrap().average_response_time;
        // 0.7 * 100 + 0.3 * 200
        assert!((avg.as_secs_f64() - 0.130).abs() < 1e-6);
    }

    #[test]
    fn test_failures_do_not_move_average() {
        let monitor = HealthMonitor::new();
        monitor.update_health("p", true, Duration::from_millis(50));
        monitor.update_health("p", false, Duration::from_secs(30));
        assert_eq!(
            monitor.get_health("p").unwrap().average_response_time,
            Duration::from_millis(50)
        );
    }

    #[test]
    fn test_snapshots_are_copies() {
        let monitor = HealthMonitor::new();
        monitor.update_health("p", true, MS);

        let mut snapshot = monitor.get_health("p").unwrap();
        snapshot.available = false;
        assert!(monitor.get_health("p").unwrap().available);
    }

    #[test]
    fn test_available_providers_sorted() {
        let monitor = HealthMonitor::new();
        monitor.update_health("zeta", true, MS);
        monitor.update_health("alpha", true, MS);
        monitor.register_provider("beta");

        assert_eq!(monitor.get_available_providers(), vec!["alpha", "zeta"]);
        assert_eq!(monitor.get_all_health().len(), 3);
    }

    #[test]
    fn test_status_line() {
        let monitor = HealthMonitor::new();
        monitor.register_provider("p");
        assert_eq!(monitor.get_health("p").unwrap().status_line(), "Unknown");

        monitor.update_health("p", true, MS);
        assert!(monitor.get_health("p").unwrap().status_line().starts_with("Available (100.0% success"));

        for _ in 0..3 {
            monitor.update_health("p", false, MS);
        }
        assert_eq!(
            monitor.get_health("p").unwrap().status_line(),
            "Unavailable (3 consecutive failures)"
        );
    }

    #[test]
    fn test_success_rate() {
        let monitor = HealthMonitor::new();
        monitor.register_provider("p");
        assert_eq!(monitor.get_health("p").unwrap().success_rate(), None);

        monitor.update_health("p", true, MS);
        monitor.update_health("p", false, MS);
        assert_eq!(monitor.get_health("p").unwrap().success_rate(), Some(0.5));
    }
}
