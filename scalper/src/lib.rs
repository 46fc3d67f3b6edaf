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

//! # Scalper
//! Decision engine for scalping crypto perpetual futures.
//!
//! Candles flow through the [`Orchestrator`]: indicators, scoring and validation from
//! [`scalper_strategy`], confirmation by the [`scalper_judge`] gateway and adjustment by the
//! [`scalper_memory`] system, producing a [`Signal`] or a typed [`Rejection`]. The [`Agent`]
//! opens positions from accepted signals, runs the [`scalper_risk`] exit ladder on every tick
//! and feeds closed trades back into memory.
//!
//! Exchanges are reached only through the [`MarketData`] and [`OrderExecution`] traits. An
//! in-memory [`HistoricalMarketData`] replay and a [`PaperExecution`] are provided.

/// Aggregated JSON configuration.
pub mod config;

/// Error types.
pub mod error;

/// `tracing` subscriber initialisation.
pub mod logging;

/// Market data & order execution boundary.
pub mod exchange;

/// Signal orchestration pipeline.
pub mod orchestrator;

/// Opt-in judge driven exits.
pub mod exit;

/// Agent loop.
pub mod agent;

pub use agent::{Agent, AgentConfig, AgentCounters, OpenPosition};
pub use config::Config;
pub use error::{ConfigError, ExchangeError, ScalperError};
pub use exchange::{Fill, HistoricalMarketData, MarketData, OrderExecution, PaperExecution};
pub use exit::{JudgeExitConfig, JudgeExitEvaluator};
pub use orchestrator::{Orchestrator, OrchestratorConfig, Rejection, Signal};

