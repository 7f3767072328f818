//! Bounded retry with linear backoff

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// How many times to attempt a call and how long to wait between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Duration) -> Self {
        Self {
            max_retries,
            backoff,
        }
    }

    /// Total attempts; a zero `max_retries` still makes one attempt
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Delay awaited before the 0-based `attempt`
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }

    /// Run `call` until it succeeds or attempts run out
    ///
    /// Every failure is retried. On exhaustion the last error is returned
    /// wrapped in [`Error::RetriesExhausted`].
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.attempts();
        let mut last_error = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                let delay = self.delay_before(attempt);
                debug!(provider = label, attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
                tokio::time::sleep(delay).await;
            }

            match call().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    warn!(
                        provider = label,
                        attempt = attempt + 1,
                        of = attempts,
                        error = %e,
                        "Provider call failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        Err(Error::RetriesExhausted(attempts, last))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_attempts_at_least_one() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).attempts(), 1);
        assert_eq!(RetryPolicy::new(4, Duration::ZERO).attempts(), 4);
    }

    #[test]
    fn test_delay_is_linear() {
        let policy = RetryPolicy::new(3, Duration::from_secs(2));
        assert_eq!(policy.delay_before(0), Duration::ZERO);
        assert_eq!(policy.delay_before(1), Duration::from_secs(2));
        assert_eq!(policy.delay_before(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_succeeds_after_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO);

        let result = policy
            .run("test", || async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(Error::LLMError("boom".to_string()))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_last_error() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        let result: Result<()> = policy
            .run("test", || async { Err(Error::LLMError("down".to_string())) })
            .await;

        match result {
            Err(Error::RetriesExhausted(attempts, last)) => {
                assert_eq!(attempts, 2);
                assert!(last.contains("down"));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }
}
