//! Retry with exponential backoff for remote API calls
//!
//! Every external boundary (chat completion, speech-to-text, text-to-speech)
//! wraps its request in [`retry`]. Only errors that report
//! [`AgentError::is_retryable`] are retried.

use std::future::Future;
use std::time::{Duration, SystemTime};

use super::error::{AgentError, AgentResult};

/// Retry policy for remote calls
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Base delay between attempts (doubles each attempt)
    pub base_delay: Duration,
    /// Maximum delay cap
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

/// Compute the delay before the next attempt.
///
/// Exponential backoff `min(base_delay * 2^attempt + jitter, max_delay)`, with
/// 0-25% jitter taken from the subsecond nanos of the system clock.
pub fn delay_for_attempt(policy: &RetryPolicy, attempt: u32) -> Duration {
    let base = policy
        .base_delay
        .saturating_mul(2u32.saturating_pow(attempt));
    let base = base.min(policy.max_delay);

    let jitter_nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();

    let jitter_fraction = (jitter_nanos % 250) as f64 / 1000.0;
    let jitter = base.mul_f64(jitter_fraction);

    (base + jitter).min(policy.max_delay)
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> AgentResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AgentResult<T>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < attempts => {
                let delay = delay_for_attempt(policy, attempt);
                tracing::warn!(
                    "[Retry] {} failed (attempt {}/{}): {}; retrying in {:?}",
                    label,
                    attempt + 1,
                    attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Map a transport error from a speech service into the taxonomy used by the
/// input channel
pub fn unavailable(service: &str, err: impl std::fmt::Display) -> AgentError {
    AgentError::ServiceUnavailable(format!("{}: {}", service, err))
}
