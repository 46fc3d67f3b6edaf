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

//! # Scalper-Judge
//! Secondary confirmation of Scalper entries & exits by an external AI judge.
//!
//! The [`JudgeGateway`] composes a per model [`TokenBucket`](scalper_integration::TokenBucket),
//! [`CircuitBreaker`](scalper_integration::CircuitBreaker) and backoff
//! [`retry`](scalper_integration::retry()) around a [`JudgeClient`] transport, parses the
//! completion leniently and always resolves to a [`Verdict`].

/// [`JudgeError`] taxonomy.
pub mod error;

/// [`JudgeAction`], [`Verdict`] and lenient response parsing.
pub mod verdict;

/// Entry & exit [`Prompt`](prompt::Prompt) construction.
pub mod prompt;

/// [`JudgeClient`] transport trait and the OpenAI compatible [`HttpJudgeClient`].
pub mod client;

/// Per model rate limiter & circuit breaker registry.
pub mod registry;

/// [`JudgeConfig`].
pub mod config;

/// [`JudgeGateway`].
pub mod gateway;

pub use client::{HttpJudgeClient, JudgeClient};
pub use config::JudgeConfig;
pub use error::JudgeError;
pub use gateway::JudgeGateway;
pub use prompt::{EntryRequest, ExitRequest};
pub use registry::ResilienceRegistry;
pub use verdict::{JudgeAction, Verdict};
