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

//! # Scalper-Risk
//! Position lifecycle management for leveraged scalps.
//!
//! * [`Position`]: an open position with its monotonic ROE ratchets and protective stop state.
//! * [`update`]: pure per-tick evaluation of the fixed exit ladder, returning the re-marked
//!   position and exactly one [`ExitAction`].
//! * [`PositionSizer`]: confidence & regime scaled position sizing.
//! * [`DailyRisk`] & [`RiskLimits`]: account level entry limits.

/// Exit ladder, [`ExitConfig`] and [`PositionUpdate`].
pub mod exit;

/// Daily loss, losing streak and open position limits.
pub mod limits;

/// [`Position`] state & pnl arithmetic.
pub mod position;

/// Confidence scaled position sizing.
pub mod sizing;

pub use exit::{ExitAction, ExitConfig, ExitReason, PeakTier, PositionUpdate, update};
pub use limits::{DailyRisk, RiskLimits, RiskViolation};
pub use position::{MIN_LEVERAGE, Position, TrailingStop};
pub use sizing::PositionSizer;
