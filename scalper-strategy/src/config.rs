use serde::{Deserialize, Serialize};

/// Points each agreeing indicator adds to the long or short accumulator.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub ema_full_stack: f64,
    pub ema_partial: f64,
    pub macd_cross: f64,
    pub macd_histogram: f64,
    pub rsi_extreme: f64,
    pub rsi_zone: f64,
    pub stochastic: f64,
    pub williams: f64,
    pub bollinger: f64,
    /// Halved when the divergence strength is below [`ScoringConfig::strong_divergence`].
    pub divergence: f64,
    pub trend: f64,
    pub momentum: f64,
    pub candle_pattern: f64,
    pub volume_spike: f64,
    pub bounce: f64,
    pub bounce_engulfing: f64,
    pub bounce_higher_lows: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            ema_full_stack: 15.0,
            ema_partial: 8.0,
            macd_cross: 20.0,
            macd_histogram: 8.0,
            rsi_extreme: 12.0,
            rsi_zone: 5.0,
            stochastic: 10.0,
            williams: 8.0,
            bollinger: 10.0,
            divergence: 25.0,
            trend: 10.0,
            momentum: 8.0,
            candle_pattern: 10.0,
            volume_spike: 5.0,
            bounce: 15.0,
            bounce_engulfing: 5.0,
            bounce_higher_lows: 5.0,
        }
    }
}

/// Thresholds used by [`score`](crate::scorer::score).
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoreWeights,

    pub min_score_for_signal: f64,
    /// Winning side must exceed the losing side by this factor.
    pub dominance_ratio: f64,
    /// Fraction of `min_score_for_signal` at which the stronger side yields a `Wait`.
    pub wait_ratio: f64,
    /// `confidence = round(100 * total_score / confidence_divisor)`.
    pub confidence_divisor: f64,

    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// RSI below this (and not oversold) leans long.
    pub rsi_long_zone: f64,
    /// RSI above this (and not overbought) leans short.
    pub rsi_short_zone: f64,

    pub stochastic_oversold: f64,
    pub stochastic_overbought: f64,
    pub williams_oversold: f64,
    pub williams_overbought: f64,
    /// %B at or below this leans long, at or above `1 - bollinger_extreme` leans short.
    pub bollinger_extreme: f64,

    pub strong_divergence: f64,
    pub min_trend_strength: f64,
    /// Absolute momentum (percent) required before momentum contributes.
    pub momentum_threshold: f64,
    pub volume_spike_ratio: f64,

    /// Oversold oscillators (of RSI, stochastic, Williams %R) required for a bounce.
    pub bounce_min_oversold: usize,
    /// Consecutive bullish candles ending at the latest bar required for a bounce.
    pub bounce_min_bullish_candles: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            min_score_for_signal: 50.0,
            dominance_ratio: 1.1,
            wait_ratio: 0.8,
            confidence_divisor: 110.0,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            rsi_long_zone: 45.0,
            rsi_short_zone: 55.0,
            stochastic_oversold: 20.0,
            stochastic_overbought: 80.0,
            williams_oversold: -80.0,
            williams_overbought: -20.0,
            bollinger_extreme: 0.05,
            strong_divergence: 50.0,
            min_trend_strength: 0.3,
            momentum_threshold: 0.1,
            volume_spike_ratio: 1.5,
            bounce_min_oversold: 2,
            bounce_min_bullish_candles: 2,
        }
    }
}

/// Hard filters and soft checks applied by [`validate`](crate::validator::validate).
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub min_score: f64,
    pub min_volume_ratio: f64,
    /// Absolute momentum ceiling in percent, above which an entry is considered chasing.
    pub max_momentum: f64,
    /// Longs are rejected above this RSI.
    pub rsi_long_max: f64,
    /// Shorts are rejected below this RSI.
    pub rsi_short_min: f64,

    pub check_trend_alignment: bool,
    pub check_volume_confirmation: bool,
    /// Volume ratio at which a signal counts as volume confirmed.
    pub volume_confirmation_ratio: f64,
    pub min_confluence: usize,

    /// Counter-trend candidates scoring below `min_score * weak_counter_trend_factor` are weak.
    pub weak_counter_trend_factor: f64,
    /// Trend strength from which a weak counter-trend candidate is rejected.
    pub counter_trend_min_strength: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_score: 50.0,
            min_volume_ratio: 0.8,
            max_momentum: 3.0,
            rsi_long_max: 75.0,
            rsi_short_min: 25.0,
            check_trend_alignment: true,
            check_volume_confirmation: true,
            volume_confirmation_ratio: 1.2,
            min_confluence: 3,
            weak_counter_trend_factor: 1.3,
            counter_trend_min_strength: 0.5,
        }
    }
}

/// Scoring and validation configuration.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub scoring: ScoringConfig,
    pub validation: ValidationConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: StrategyConfig =
            serde_json::from_str(r#"{"scoring": {"min_score_for_signal": 60.0}}"#).unwrap();

        assert_eq!(config.scoring.min_score_for_signal, 60.0);
        assert_eq!(config.scoring.weights, ScoreWeights::default());
        assert_eq!(config.validation, ValidationConfig::default());
    }
}
