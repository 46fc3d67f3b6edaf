use derive_more::Display;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// Circuit breaker configuration.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in [`BreakerState::Closed`] that open the breaker.
    pub failure_threshold: u32,
    /// Consecutive successes in [`BreakerState::HalfOpen`] that close the breaker.
    pub success_threshold: u32,
    /// Time spent [`BreakerState::Open`] before a probe is allowed.
    pub timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout_ms: 60_000,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Observable state of a [`CircuitBreaker`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    /// Normal operation.
    #[display("CLOSED")]
    Closed,
    /// Failing fast until the timeout elapses.
    #[display("OPEN")]
    Open,
    /// Probing recovery.
    #[display("HALF_OPEN")]
    HalfOpen,
}

/// Point in time view of a [`CircuitBreaker`] and its counters.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
}

#[derive(Debug, Error)]
pub enum BreakerError<E> {
    #[error("circuit breaker open")]
    Open,

    #[error(transparent)]
    Inner(E),
}

#[derive(Debug)]
enum State {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { successes: u32, probing: bool },
}

/// Closed / Open / HalfOpen circuit breaker.
///
/// Closed counts consecutive failures and opens at `failure_threshold`. Open rejects every call
/// until `timeout` has elapsed, after which a single probe is let through in HalfOpen. In
/// HalfOpen any failure reopens, and `success_threshold` consecutive successes close and reset.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: Mutex::new(State::Closed { failures: 0 }),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.snapshot().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        match *self.state.lock() {
            State::Closed { failures } => BreakerSnapshot {
                state: BreakerState::Closed,
                consecutive_failures: failures,
                consecutive_successes: 0,
            },
            State::Open { .. } => BreakerSnapshot {
                state: BreakerState::Open,
                consecutive_failures: self.config.failure_threshold,
                consecutive_successes: 0,
            },
            State::HalfOpen { successes, .. } => BreakerSnapshot {
                state: BreakerState::HalfOpen,
                consecutive_failures: 0,
                consecutive_successes: successes,
            },
        }
    }

    /// Ask permission to execute a call, transitioning Open -> HalfOpen once the timeout has
    /// elapsed. Rejected permits have no side effects.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        match &mut *state {
            State::Closed { .. } => true,
            State::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.timeout() {
                    info!("circuit breaker half-open, probing");
                    *state = State::HalfOpen {
                        successes: 0,
                        probing: true,
                    };
                    true
                } else {
                    false
                }
            }
            State::HalfOpen { probing, .. } => {
                if *probing {
                    false
                } else {
                    *probing = true;
                    true
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        match &mut *state {
            State::Closed { failures } => *failures = 0,
            State::Open { .. } => {}
            State::HalfOpen { successes, probing } => {
                *successes += 1;
                *probing = false;
                if *successes >= self.config.success_threshold {
                    info!("circuit breaker closed");
                    *state = State::Closed { failures: 0 };
                }
            }
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock();
        match &mut *state {
            State::Closed { failures } => {
                *failures += 1;
                if *failures >= self.config.failure_threshold {
                    warn!(failures = *failures, "circuit breaker opened");
                    *state = State::Open {
                        opened_at: Instant::now(),
                    };
                }
            }
            State::Open { .. } => {}
            State::HalfOpen { .. } => {
                warn!("circuit breaker probe failed, reopening");
                *state = State::Open {
                    opened_at: Instant::now(),
                };
            }
        }
    }

    /// Hand back a HalfOpen probe permit whose call never completed.
    fn release_probe(&self) {
        if let State::HalfOpen { probing, .. } = &mut *self.state.lock() {
            *probing = false;
        }
    }

    /// Execute `operation` through the breaker.
    ///
    /// Fails fast with [`BreakerError::Open`] without invoking `operation` when no permit is
    /// available.
    pub async fn call<Operation, Fut, T, E>(&self, operation: Operation) -> Result<T, BreakerError<E>>
    where
        Operation: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.try_acquire() {
            return Err(BreakerError::Open);
        }

        let mut permit = Permit {
            breaker: self,
            in_flight: true,
        };
        let result = operation().await;
        permit.in_flight = false;

        match result {
            Ok(output) => {
                self.record_success();
                Ok(output)
            }
            Err(error) => {
                self.record_failure();
                Err(BreakerError::Inner(error))
            }
        }
    }
}

/// Permit held by an in-flight [`CircuitBreaker::call`], released if the call is dropped
/// before it completes.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    in_flight: bool,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.in_flight {
            self.breaker.release_probe();
        }
    }
}
