//! Retry with exponential backoff for remote calls
//!
//! Every adapter request goes through [`with_retry`]. Reconcilers never
//! retry on their own: once an adapter gives up, the error propagates and
//! the pairing is aborted.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt)
    pub max_retries: u32,

    pub initial_backoff: Duration,

    pub max_backoff: Duration,

    /// Backoff multiplier (2.0 for exponential backoff)
    pub multiplier: f64,

    /// Add up to 25% random jitter to each backoff
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Single attempt, no retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Backoff duration before retry number `attempt` (0-based)
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_secs_f64() * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_backoff.as_secs_f64());

        let final_duration = if self.jitter {
            capped * (1.0 + rand_jitter() * 0.25)
        } else {
            capped
        };

        Duration::from_secs_f64(final_duration)
    }
}

/// Pseudo-random jitter in [0.0, 1.0) from the clock's sub-second nanos
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    (nanos % 1000) as f64 / 1000.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    /// Retry after a specific duration (e.g. from a Retry-After header)
    RetryAfter(Duration),
    /// The error is permanent
    NoRetry,
}

/// Errors that know whether the failed call is worth repeating
pub trait RetryableError {
    fn retry_decision(&self) -> RetryDecision;
}

/// Execute an async operation, retrying transient failures
///
/// Returns the first success, the first permanent error, or the last
/// transient error once `config.max_retries` is exhausted.
pub async fn with_retry<F, Fut, T, E>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        let err = match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => e,
        };

        let decision = err.retry_decision();
        if decision == RetryDecision::NoRetry {
            debug!(operation = operation_name, attempt, error = %err, "Permanent failure");
            return Err(err);
        }

        if attempt >= config.max_retries {
            warn!(
                operation = operation_name,
                attempts = attempt + 1,
                error = %err,
                "Giving up after repeated failures"
            );
            return Err(err);
        }

        let backoff = match decision {
            RetryDecision::RetryAfter(d) => d.min(config.max_backoff),
            _ => config.backoff_duration(attempt),
        };

        warn!(
            operation = operation_name,
            attempt = attempt + 1,
            max_attempts = config.max_retries + 1,
            backoff_secs = backoff.as_secs_f64(),
            error = %err,
            "Retrying after transient failure"
        );

        sleep(backoff).await;
        attempt += 1;
    }
}
