use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{CatalogError, PricingError};

/// Retry policy for catalog queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,

    /// Delay unit; the wait after attempt `n` is `n * backoff_unit`
    pub backoff_unit: Duration,

    /// Deadline for a single attempt
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Defaults:
    /// - max_attempts: 3
    /// - backoff_unit: 500ms
    /// - attempt_timeout: 30s
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Linear backoff: attempt × unit
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// Every attempt failed
#[derive(Debug, Clone, PartialEq)]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last_error: CatalogError,
}

impl From<RetryExhausted> for PricingError {
    fn from(err: RetryExhausted) -> Self {
        PricingError::Transport {
            attempts: err.attempts,
            source: err.last_error,
        }
    }
}

/// Run a catalog operation under the policy.
///
/// Each attempt is bounded by `attempt_timeout`; an elapsed deadline counts
/// as a failed attempt. Dropping the returned future cancels the in-flight
/// attempt and any pending backoff sleep.
///
/// # Example
/// ```ignore
/// let entries = with_retry(&policy, || client.query(&query)).await?;
/// ```
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, mut operation: F) -> Result<T, RetryExhausted>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CatalogError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let outcome = match tokio::time::timeout(policy.attempt_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(CatalogError::Timeout(policy.attempt_timeout)),
        };

        match outcome {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Catalog query succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt >= max_attempts => {
                warn!(attempts = attempt, error = %e, "Catalog query failed on every attempt");
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: e,
                });
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                debug!(
                    attempt,
                    max_attempts,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Catalog query failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
