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

//! Multi-factor signal scoring and validation for Scalper.
//!
//! [`score`] fuses an [`IndicatorSnapshot`](scalper_ta::IndicatorSnapshot) and its candles into
//! a directional [`SignalScore`]. [`validate`] then applies hard filters ([`Rejection`]) and soft
//! checks ([`Warning`]) to that score.

/// [`ScoringConfig`], [`ValidationConfig`] and the [`ScoreWeights`] table.
pub mod config;

/// Weighted long / short accumulation and direction selection.
pub mod scorer;

/// Hard filters & soft checks applied to a [`SignalScore`].
pub mod validator;

pub use config::{ScoreWeights, ScoringConfig, StrategyConfig, ValidationConfig};
pub use scorer::{Bounce, Direction, SignalScore, score};
pub use validator::{Rejection, Validation, Warning, check_counter_trend, check_rsi, validate};
