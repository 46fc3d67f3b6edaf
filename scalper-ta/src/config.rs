use serde::{Deserialize, Serialize};

/// Lowest number of candles any snapshot is computed from, regardless of configuration.
pub const MIN_CANDLES_FLOOR: usize = 50;

/// Periods and thresholds used by [`compute`](crate::snapshot::compute).
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,

    pub ema_fast: usize,
    pub ema_mid: usize,
    pub ema_slow: usize,

    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,

    pub bollinger_period: usize,
    pub bollinger_std_dev: f64,

    pub stochastic_period: usize,
    pub stochastic_smoothing: usize,
    pub williams_period: usize,
    pub atr_period: usize,

    /// Short lookback (bars) for momentum percentage change.
    pub momentum_lookback: usize,
    /// Long lookback (bars) for rate-of-change.
    pub roc_period: usize,

    /// Number of bars preceding the recent volume bars used as the baseline average.
    pub volume_window: usize,
    /// Number of most recent bars averaged for the volume ratio numerator.
    pub volume_recent: usize,

    pub trend_sma_fast: usize,
    pub trend_sma_slow: usize,
    /// Bars inspected for directional consistency when computing trend strength.
    pub trend_consistency_window: usize,

    /// Length of each of the two adjacent windows compared for divergence.
    pub divergence_lookback: usize,

    /// Bars inspected for swing highs / lows.
    pub levels_lookback: usize,
    /// Bars either side of a candidate swing point that must be lower (highs) or higher (lows).
    pub swing_strength: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            ema_fast: 9,
            ema_mid: 21,
            ema_slow: 50,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            bollinger_period: 20,
            bollinger_std_dev: 2.0,
            stochastic_period: 14,
            stochastic_smoothing: 3,
            williams_period: 14,
            atr_period: 14,
            momentum_lookback: 5,
            roc_period: 10,
            volume_window: 20,
            volume_recent: 3,
            trend_sma_fast: 20,
            trend_sma_slow: 50,
            trend_consistency_window: 10,
            divergence_lookback: 10,
            levels_lookback: 50,
            swing_strength: 2,
        }
    }
}

impl IndicatorConfig {
    /// Minimum number of candles required to compute an
    /// [`IndicatorSnapshot`](crate::snapshot::IndicatorSnapshot).
    pub fn min_candles(&self) -> usize {
        self.trend_sma_slow
            .max(self.rsi_period + 5)
            .max(MIN_CANDLES_FLOOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_candles() {
        struct TestCase {
            config: IndicatorConfig,
            expected: usize,
        }

        let cases = vec![
            // TC0: defaults bounded by the floor
            TestCase {
                config: IndicatorConfig::default(),
                expected: 50,
            },
            // TC1: slow trend SMA dominates
            TestCase {
                config: IndicatorConfig {
                    trend_sma_slow: 100,
                    ..Default::default()
                },
                expected: 100,
            },
            // TC2: long RSI period dominates
            TestCase {
                config: IndicatorConfig {
                    rsi_period: 60,
                    ..Default::default()
                },
                expected: 65,
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            assert_eq!(test.config.min_candles(), test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_de_partial_config() {
        let config =
            serde_json::from_str::<IndicatorConfig>(r#"{"rsi_period": 7, "ema_slow": 34}"#).unwrap();

        assert_eq!(config.rsi_period, 7);
        assert_eq!(config.ema_slow, 34);
        assert_eq!(config.macd_slow, IndicatorConfig::default().macd_slow);
        assert_eq!(config.min_candles(), MIN_CANDLES_FLOOR);
    }
}
