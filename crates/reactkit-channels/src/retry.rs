use std::future::Future;

use reactkit_core::RetryConfig;
use tokio::time::{sleep, Duration};
use tracing::warn;

use crate::error::TransportError;

/// Bounded retry schedule for transport calls.
///
/// Schedule: base → 2×base → 4×base … capped at `max_delay`, for at most
/// `max_attempts` tries in total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or runs out of attempts.
///
/// Permanent errors (see [`TransportError::is_permanent`]) are returned
/// without retrying. Otherwise the error of the final attempt is returned.
/// A rate limit stretches the wait to at least the platform's `retry_after`.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delay = policy.base_delay;

    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_permanent() || attempt >= max_attempts => return Err(e),
            Err(e) => {
                let wait = match &e {
                    TransportError::RateLimited { retry_after_ms } => {
                        delay.max(Duration::from_millis(*retry_after_ms))
                    }
                    _ => delay,
                };
                warn!(
                    op = %label,
                    attempt,
                    max = max_attempts,
                    error = %e,
                    retry_after = ?wait,
                    "transport call failed, retrying"
                );
                sleep(wait).await;
                delay = (delay * 2).min(policy.max_delay);
                attempt += 1;
            }
        }
    }
}
