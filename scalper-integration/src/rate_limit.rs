use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

/// Token bucket configuration.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sustained refill rate.
    pub requests_per_minute: u32,
    /// Bucket capacity, ie/ the most permits that can be granted back to back.
    pub burst: u32,
    /// Longest [`TokenBucket::acquire`] waits for a permit before failing.
    pub max_wait_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 60,
            burst: 10,
            max_wait_ms: 5_000,
        }
    }
}

impl RateLimitConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Error)]
pub enum RateLimitError {
    #[error("rate limited: no permit available within {waited:?}")]
    Exhausted { waited: Duration },
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket rate limiter.
///
/// Holds at most `burst` tokens and refills continuously at `requests_per_minute / 60_000`
/// tokens per millisecond. Uses [`tokio::time::Instant`] so it follows a paused test clock.
#[derive(Debug)]
pub struct TokenBucket {
    max_tokens: f64,
    /// Tokens per millisecond.
    refill_rate: f64,
    max_wait: Duration,
    bucket: Mutex<Bucket>,
}

impl TokenBucket {
    /// Construct a full [`TokenBucket`].
    pub fn new(config: &RateLimitConfig) -> Self {
        let max_tokens = f64::from(config.burst.max(1));
        Self {
            max_tokens,
            refill_rate: f64::from(config.requests_per_minute) / 60_000.0,
            max_wait: config.max_wait(),
            bucket: Mutex::new(Bucket {
                tokens: max_tokens,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed_ms = now.duration_since(bucket.last_refill).as_secs_f64() * 1_000.0;
        bucket.tokens = (bucket.tokens + elapsed_ms * self.refill_rate).min(self.max_tokens);
        bucket.last_refill = now;
    }

    /// Currently available tokens, never above the configured burst.
    pub fn available(&self) -> f64 {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens
    }

    /// Take one token if available, without waiting.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_or_wait_time().is_ok()
    }

    /// Take one token, or return how long until one is available.
    fn try_acquire_or_wait_time(&self) -> Result<(), Duration> {
        let mut bucket = self.bucket.lock();
        self.refill(&mut bucket, Instant::now());

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return Ok(());
        }

        if self.refill_rate <= 0.0 {
            return Err(Duration::MAX);
        }
        let missing = 1.0 - bucket.tokens;
        Err(Duration::from_secs_f64(missing / self.refill_rate / 1_000.0))
    }

    /// Take one token, waiting at most the configured `max_wait` for it to refill.
    pub async fn acquire(&self) -> Result<(), RateLimitError> {
        let start = Instant::now();
        loop {
            let wait = match self.try_acquire_or_wait_time() {
                Ok(()) => return Ok(()),
                Err(wait) => wait,
            };

            let waited = start.elapsed();
            if waited.saturating_add(wait) > self.max_wait {
                debug!(?waited, ?wait, "token bucket exhausted");
                return Err(RateLimitError::Exhausted { waited });
            }

            tokio::time::sleep(wait).await;
        }
    }
}
