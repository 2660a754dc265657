//! Exponential backoff with jitter for registry lookups.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::errors::RegistryError;

/// Default attempts per lookup, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default growth factor between consecutive delays.
pub const DEFAULT_BACKOFF_FACTOR: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: u32,
    /// Up to this fraction of each delay is added at random.
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            factor: DEFAULT_BACKOFF_FACTOR,
            jitter_ratio: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Retries without sleeping. Used by tests and the in-memory registry.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            factor: 1,
            jitter_ratio: 0.0,
        }
    }

    /// Delay before retry number `retry` (1-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let multiplier = self.factor.max(1).saturating_pow(exponent);
        self.base_delay.saturating_mul(multiplier)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter_ratio <= 0.0 || delay.is_zero() {
            return delay;
        }
        let spread = delay.mul_f64(self.jitter_ratio).as_millis() as u64;
        let extra = rand::thread_rng().gen_range(0..=spread);
        delay + Duration::from_millis(extra)
    }
}

/// Run `op` until it succeeds, fails terminally, or attempts run out.
///
/// Only transient errors (`RateLimited`, `Unavailable`) are retried. The last
/// error is returned once `max_attempts` is exhausted.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, RegistryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RegistryError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.jittered(policy.backoff(attempt));
                tracing::warn!(
                    "{}: transient failure (attempt {}/{}): {}. Backing off {}ms",
                    label,
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_transient() {
                    tracing::warn!("{}: giving up after {} attempts: {}", label, attempt, e);
                }
                return Err(e);
            }
        }
    }
}
