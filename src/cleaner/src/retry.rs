//! Fixed-delay retry around repository calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::metrics::CleanupMetrics;

/// Attempt budget and pause for one kind of operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one, at least 1.
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Candidate page loads and version lookups.
    pub fn query() -> Self {
        Self::new(3, Duration::from_secs(1))
    }

    /// Physical node deletion.
    pub fn deletion() -> Self {
        Self::new(3, Duration::from_secs(3))
    }

    /// No pause between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }
}

impl From<common::config::RetryConfig> for RetryPolicy {
    fn from(config: common::config::RetryConfig) -> Self {
        Self::new(config.max_attempts, config.delay)
    }
}

/// Run `op` until it succeeds or the policy's attempts are used up. Every
/// error is considered transient. Returns the last error on exhaustion.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    metrics: &CleanupMetrics,
    operation: &str,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < max_attempts => {
                warn!(
                    operation,
                    error = %error,
                    attempt,
                    max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    "Retryable error, will retry after delay"
                );
                metrics.record_retry();
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
