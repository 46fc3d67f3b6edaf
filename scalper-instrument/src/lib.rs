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

//! # Scalper-Instrument
//! Core data structures shared by every Scalper crate: the traded [`Symbol`], the directional
//! [`Side`] of a position, and the OHLCV [`Candle`](candle::Candle) consumed by the indicator
//! engine.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, StrExt};
use std::borrow::Borrow;

/// OHLCV [`Candle`](candle::Candle) and series helpers.
pub mod candle;

pub use candle::Candle;

/// `SmolStr` identifier for a perpetual futures market (eg/ "BTCUSDT").
///
/// Always stored uppercase so "btcusdt" and "BTCUSDT" key the same memory tables.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Display)]
pub struct Symbol(pub SmolStr);

impl Symbol {
    pub fn new<S>(name: S) -> Self
    where
        S: Into<SmolStr>,
    {
        let name = name.into();
        if name.chars().any(char::is_lowercase) {
            Self(name.to_uppercase_smolstr())
        } else {
            Self(name)
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Symbol {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Symbol {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for Symbol {
    fn borrow(&self) -> &str {
        self.0.borrow()
    }
}

impl AsRef<str> for Symbol {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::de::Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Symbol::new(name))
    }
}

/// [`Side`] of a directional position - Long or Short.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Deserialize, Serialize, Display,
)]
pub enum Side {
    #[serde(alias = "long", alias = "LONG", alias = "buy", alias = "BUY")]
    #[display("LONG")]
    Long,
    #[serde(alias = "short", alias = "SHORT", alias = "sell", alias = "SELL")]
    #[display("SHORT")]
    Short,
}

impl Side {
    /// +1.0 for [`Side::Long`], -1.0 for [`Side::Short`]. Multiply a price delta by this to get
    /// the signed profit per unit.
    pub fn sign(&self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}
