use crate::{
    config::IndicatorConfig,
    indicators::{
        Bollinger, Macd, Stochastic, atr, bollinger, ema_last, macd, percent_change, rsi,
        stochastic, volume_ratio, williams_r,
    },
    trend::{Divergence, Trend, divergence, trend},
};
use scalper_instrument::Candle;
use serde::{Deserialize, Serialize};

/// Value-typed indicator snapshot of the latest bar of a candle series.
///
/// Recomputed from scratch on every evaluation and never mutated afterwards.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndicatorSnapshot {
    pub price: f64,
    pub rsi: f64,
    /// Short lookback percentage change.
    pub momentum: f64,
    /// Long lookback percentage change.
    pub roc: f64,
    pub volume_ratio: f64,
    pub trend: Trend,
    pub trend_strength: f64,
    pub sma_fast: f64,
    pub sma_slow: f64,
    pub ema9: f64,
    pub ema21: f64,
    pub ema50: f64,
    pub macd: Macd,
    pub bollinger: Bollinger,
    pub stochastic: Stochastic,
    pub williams_r: f64,
    pub atr: f64,
    pub atr_percent: f64,
    pub divergence: Option<Divergence>,
}

impl IndicatorSnapshot {
    /// EMAs stacked bullishly: price > ema9 > ema21 > ema50.
    pub fn ema_bull_stack(&self) -> bool {
        self.price > self.ema9 && self.ema9 > self.ema21 && self.ema21 > self.ema50
    }

    /// EMAs stacked bearishly: price < ema9 < ema21 < ema50.
    pub fn ema_bear_stack(&self) -> bool {
        self.price < self.ema9 && self.ema9 < self.ema21 && self.ema21 < self.ema50
    }
}

/// Compute an [`IndicatorSnapshot`] for the latest candle.
///
/// Returns `None` when the series is shorter than [`IndicatorConfig::min_candles`].
pub fn compute(candles: &[Candle], config: &IndicatorConfig) -> Option<IndicatorSnapshot> {
    if candles.len() < config.min_candles() {
        return None;
    }

    let closes = candles.iter().map(|candle| candle.close).collect::<Vec<_>>();
    let volumes = candles.iter().map(|candle| candle.volume).collect::<Vec<_>>();
    let price = *closes.last()?;

    let trend_state = trend(
        &closes,
        config.trend_sma_fast,
        config.trend_sma_slow,
        config.trend_consistency_window,
    );

    let atr = atr(candles, config.atr_period);
    let atr_percent = if price != 0.0 { atr / price * 100.0 } else { 0.0 };

    Some(IndicatorSnapshot {
        price,
        rsi: rsi(&closes, config.rsi_period),
        momentum: percent_change(&closes, config.momentum_lookback),
        roc: percent_change(&closes, config.roc_period),
        volume_ratio: volume_ratio(&volumes, config.volume_window, config.volume_recent),
        trend: trend_state.trend,
        trend_strength: trend_state.strength,
        sma_fast: trend_state.sma_fast,
        sma_slow: trend_state.sma_slow,
        ema9: ema_last(&closes, config.ema_fast)?,
        ema21: ema_last(&closes, config.ema_mid)?,
        ema50: ema_last(&closes, config.ema_slow)?,
        macd: macd(&closes, config.macd_fast, config.macd_slow, config.macd_signal),
        bollinger: bollinger(&closes, config.bollinger_period, config.bollinger_std_dev),
        stochastic: stochastic(candles, config.stochastic_period, config.stochastic_smoothing),
        williams_r: williams_r(candles, config.williams_period),
        atr,
        atr_percent,
        divergence: divergence(&closes, config.rsi_period, config.divergence_lookback),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};

    fn series(len: usize, step: f64) -> Vec<Candle> {
        (0..len)
            .map(|i| {
                let open_time = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::minutes(i as i64);
                let close = 100.0 + step * i as f64;
                Candle {
                    open_time,
                    open: close - step,
                    high: close + 0.5,
                    low: close - 0.5 - step.abs(),
                    close,
                    volume: 1000.0,
                    close_time: open_time + TimeDelta::seconds(59),
                }
            })
            .collect()
    }

    #[test]
    fn test_compute_requires_min_candles() {
        let config = IndicatorConfig::default();
        for len in [0, 1, 20, 49] {
            assert!(compute(&series(len, 0.1), &config).is_none(), "len {len}");
        }
        assert!(compute(&series(50, 0.1), &config).is_some());
    }

    #[test]
    fn test_compute_uptrend_snapshot() {
        let snapshot = compute(&series(80, 0.2), &IndicatorConfig::default()).unwrap();

        assert_eq!(snapshot.trend, Trend::Up);
        assert!(snapshot.ema_bull_stack());
        assert!(!snapshot.ema_bear_stack());
        assert_eq!(snapshot.rsi, 100.0);
        assert!(snapshot.momentum > 0.0);
        assert!(snapshot.roc > snapshot.momentum);
        assert!((snapshot.volume_ratio - 1.0).abs() < 1e-9);
        assert!(snapshot.williams_r <= 0.0 && snapshot.williams_r >= -100.0);
        assert!(snapshot.atr > 0.0);
        assert!(snapshot.macd.macd > 0.0);
    }
}
