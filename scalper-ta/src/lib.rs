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

//! Technical analysis engine for Scalper.
//!
//! Turns an ordered [`Candle`](scalper_instrument::Candle) series into a value-typed
//! [`IndicatorSnapshot`] via the pure [`compute`] transform. The individual indicators, candle
//! pattern detection and support / resistance helpers are exposed for reuse by the scorer and
//! the position lifecycle manager.

/// [`IndicatorConfig`] periods & thresholds.
pub mod config;

/// Moving averages, oscillators, volatility and volume indicators.
pub mod indicators;

/// Crossovers and candle patterns.
pub mod patterns;

/// Trend classification and price / RSI divergence.
pub mod trend;

/// Swing & pivot support / resistance levels.
pub mod levels;

/// [`IndicatorSnapshot`] and the [`compute`] entry point.
pub mod snapshot;

pub use config::IndicatorConfig;
pub use snapshot::{IndicatorSnapshot, compute};
pub use trend::Trend;
