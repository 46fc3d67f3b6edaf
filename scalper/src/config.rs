use crate::{
    agent::AgentConfig, error::ConfigError, exit::JudgeExitConfig,
    orchestrator::OrchestratorConfig,
};
use scalper_instrument::Symbol;
use scalper_judge::JudgeConfig;
use scalper_memory::MemoryConfig;
use scalper_risk::{ExitConfig, MIN_LEVERAGE, PositionSizer, RiskLimits};
use scalper_strategy::StrategyConfig;
use scalper_ta::IndicatorConfig;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{fs::File, io::BufReader, path::Path};

/// Complete scalper configuration. Every section falls back to its defaults when omitted.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Symbols scanned for entries.
    pub symbols: Vec<Symbol>,
    pub indicators: IndicatorConfig,
    pub strategy: StrategyConfig,
    pub orchestrator: OrchestratorConfig,
    pub judge: JudgeConfig,
    pub judge_exit: JudgeExitConfig,
    pub memory: MemoryConfig,
    pub exit: ExitConfig,
    pub sizing: PositionSizer,
    pub limits: RiskLimits,
    pub agent: AgentConfig,
}

impl Config {
    /// Load and [`validate`](Self::validate) a JSON [`Config`] file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = read_json::<Self>(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would silently disable sizing or ROE tracking.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizing = &self.sizing;
        if !(sizing.leverage.is_finite() && sizing.leverage >= MIN_LEVERAGE) {
            return Err(ConfigError::Invalid {
                field: "sizing.leverage",
                reason: format!("{} is below {MIN_LEVERAGE}", sizing.leverage),
            });
        }
        if !(sizing.min_margin_usd > 0.0 && sizing.min_margin_usd <= sizing.max_margin_usd) {
            return Err(ConfigError::Invalid {
                field: "sizing.min_margin_usd",
                reason: format!(
                    "expected 0 < {} <= max_margin_usd {}",
                    sizing.min_margin_usd, sizing.max_margin_usd
                ),
            });
        }
        Ok(())
    }
}

/// Deserialise a JSON file, eg/ a [`Config`] or a candle set.
pub fn read_json<T>(path: impl AsRef<Path>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
