use scalper_instrument::Symbol;
use scalper_judge::JudgeError;
use std::path::PathBuf;
use thiserror::Error;

/// Top level error of the scalper binary & agent construction.
#[derive(Debug, Error)]
pub enum ScalperError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("exchange: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("judge: {0}")]
    Judge(#[from] JudgeError),
}

/// Failure loading a [`Config`](crate::config::Config) file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Failure returned by a market data or order execution collaborator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExchangeError {
    #[error("unknown symbol: {0}")]
    UnknownSymbol(Symbol),

    #[error("no market data for {0}")]
    NoData(Symbol),

    #[error("invalid order quantity {quantity} for {symbol}")]
    InvalidQuantity { symbol: Symbol, quantity: f64 },

    #[error("order rejected: {0}")]
    Rejected(String),
}
