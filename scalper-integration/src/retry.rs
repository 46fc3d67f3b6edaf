use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};
use tracing::warn;

/// Errors that know whether the operation that produced them is worth retrying.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Exponential backoff retry policy.
///
/// The delay before retry `attempt` (0 based) is
/// `min(max_delay, initial_delay * multiplier^attempt)`, randomised by `± jitter`.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub multiplier: f64,
    /// Fractional jitter, eg/ 0.3 => ±30%.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            jitter: 0.3,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Un-jittered backoff before retry `attempt`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay_ms as f64 * self.multiplier.powi(exponent);
        Duration::from_millis(delay_ms.min(self.max_delay_ms as f64) as u64)
    }

    /// Jittered backoff before retry `attempt`.
    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let base = self.base_delay(attempt).as_secs_f64();
        let jitter = self.jitter.abs();
        let factor = if jitter > 0.0 {
            1.0 + rng.random_range(-jitter..=jitter)
        } else {
            1.0
        };
        Duration::from_secs_f64((base * factor).max(0.0))
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or the policy's
/// attempts are exhausted. `operation` receives the 0 based attempt number.
pub async fn retry<Operation, Fut, T, E>(policy: &RetryPolicy, mut operation: Operation) -> Result<T, E>
where
    Operation: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let error = match operation(attempt).await {
            Ok(output) => return Ok(output),
            Err(error) => error,
        };

        if !error.is_retryable() || attempt + 1 >= max_attempts {
            return Err(error);
        }

        let delay = policy.delay(attempt, &mut rand::rng());
        warn!(
            attempt,
            max_attempts,
            ?delay,
            %error,
            "retryable failure, backing off"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
