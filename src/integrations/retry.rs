//! Retry with exponential backoff for tracker API calls
//!
//! Retries belong to the transport layer: adapters wrap each HTTP call with
//! [`with_retry`], the step pipeline never retries on its own.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff policy shared by both adapters
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Extra attempts after the first call
    pub max_retries: u32,
    pub first_delay: Duration,
    /// No single wait exceeds this, `Retry-After` included
    pub delay_cap: Duration,
    /// Factor applied to the delay after each failed attempt
    pub growth: f64,
    /// Stretch each delay by up to a quarter
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            first_delay: Duration::from_millis(500),
            delay_cap: Duration::from_secs(30),
            growth: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Default backoff curve with a custom retry budget
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Single attempt, used by tests and the `replay` command
    pub fn no_retry() -> Self {
        Self::with_max_retries(0)
    }

    /// Wait after failed attempt `attempt` (zero-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exp = self.growth.powi(attempt.min(i32::MAX as u32) as i32);
        let base = (self.first_delay.as_secs_f64() * exp).min(self.delay_cap.as_secs_f64());
        let factor = if self.jitter {
            1.0 + jitter_fraction() * 0.25
        } else {
            1.0
        };
        Duration::from_secs_f64(base * factor)
    }
}

/// Pseudo-random value in [0, 1) derived from the clock
fn jitter_fraction() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    f64::from(nanos % 1000) / 1000.0
}

/// What a failed call asks of the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    /// The tracker said how long to wait
    RetryAfter(Duration),
    NoRetry,
}

pub trait RetryableError {
    fn retry_decision(&self) -> RetryDecision;
}

/// Call `operation` until it succeeds or its error says stop.
///
/// A spent budget returns the last error unchanged.
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
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let backoff = match err.retry_decision() {
            RetryDecision::NoRetry => {
                debug!(operation = operation_name, attempt, error = %err, "Permanent failure");
                return Err(err);
            }
            _ if attempt >= config.max_retries => {
                warn!(
                    operation = operation_name,
                    attempts = attempt + 1,
                    error = %err,
                    "Giving up after retries"
                );
                return Err(err);
            }
            RetryDecision::RetryAfter(delay) => delay.min(config.delay_cap),
            RetryDecision::Retry => config.delay_after(attempt),
        };

        warn!(
            operation = operation_name,
            attempt = attempt + 1,
            max_attempts = config.max_retries + 1,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "Retrying tracker call"
        );
        sleep(backoff).await;
        attempt += 1;
    }
}
