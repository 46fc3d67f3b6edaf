#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]

//! # Scalper-Integration
//! Low-level resilience & Http plumbing used by Scalper to talk to external services.
//!
//! ## Core abstractions:
//! - **TokenBucket** rate limiter with a bounded wait.
//! - **CircuitBreaker** Closed / Open / HalfOpen failure isolation.
//! - **retry** exponential backoff with jitter for [`Retryable`](retry::Retryable) errors.
//! - **RestClient** providing configurable Http communication between client & server.

/// All [`Error`](std::error::Error)s generated in Scalper-Integration.
pub mod error;

/// Http protocol [`RestRequest`](protocol::http::rest::RestRequest) abstractions and client.
pub mod protocol;

/// Token bucket rate limiter.
pub mod rate_limit;

/// Closed / Open / HalfOpen circuit breaker.
pub mod circuit_breaker;

/// Exponential backoff retry policy.
pub mod retry;

pub use circuit_breaker::{BreakerError, BreakerState, CircuitBreaker, CircuitBreakerConfig};
pub use error::SocketError;
pub use rate_limit::{RateLimitConfig, RateLimitError, TokenBucket};
pub use retry::{RetryPolicy, Retryable, retry};
