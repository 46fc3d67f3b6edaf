use crate::indicators::{rsi_series, sma};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Coarse price trend derived from price vs the fast & slow trend SMAs.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Deserialize, Serialize, Display)]
#[serde(rename_all = "UPPERCASE")]
pub enum Trend {
    #[display("UP")]
    Up,
    #[display("DOWN")]
    Down,
    #[default]
    #[display("SIDEWAYS")]
    Sideways,
}

/// Trend classification with a bounded [0, 1] strength.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct TrendState {
    pub trend: Trend,
    pub strength: f64,
    pub sma_fast: f64,
    pub sma_slow: f64,
}

/// SMA deviation (in percent) that saturates the deviation half of the strength composite.
const SATURATING_DEVIATION_PERCENT: f64 = 2.0;

/// Classify the trend of `closes` and compute its strength.
///
/// Strength is the mean of the SMA deviation (saturating at 2%) and the directional
/// consistency of the last `consistency_window` close-to-close changes.
pub fn trend(
    closes: &[f64],
    fast_period: usize,
    slow_period: usize,
    consistency_window: usize,
) -> TrendState {
    let (Some(price), Some(sma_fast), Some(sma_slow)) = (
        closes.last().copied(),
        sma(closes, fast_period),
        sma(closes, slow_period),
    ) else {
        return TrendState::default();
    };

    let trend = if price > sma_fast && sma_fast > sma_slow {
        Trend::Up
    } else if price < sma_fast && sma_fast < sma_slow {
        Trend::Down
    } else {
        Trend::Sideways
    };

    let deviation = if sma_slow != 0.0 {
        (sma_fast - sma_slow).abs() / sma_slow * 100.0
    } else {
        0.0
    };
    let deviation_score = (deviation / SATURATING_DEVIATION_PERCENT).min(1.0);

    let consistency = directional_consistency(closes, consistency_window, trend);

    TrendState {
        trend,
        strength: (0.5 * deviation_score + 0.5 * consistency).clamp(0.0, 1.0),
        sma_fast,
        sma_slow,
    }
}

fn directional_consistency(closes: &[f64], window: usize, trend: Trend) -> f64 {
    if window == 0 || closes.len() < 2 {
        return 0.0;
    }

    let start = closes.len().saturating_sub(window + 1);
    let (ups, downs, total) = closes[start..].windows(2).fold(
        (0usize, 0usize, 0usize),
        |(ups, downs, total), pair| match pair[1].partial_cmp(&pair[0]) {
            Some(std::cmp::Ordering::Greater) => (ups + 1, downs, total + 1),
            Some(std::cmp::Ordering::Less) => (ups, downs + 1, total + 1),
            _ => (ups, downs, total + 1),
        },
    );

    if total == 0 {
        return 0.0;
    }

    let total = total as f64;
    match trend {
        Trend::Up => ups as f64 / total,
        Trend::Down => downs as f64 / total,
        Trend::Sideways => (ups as f64 - downs as f64).abs() / total,
    }
}

/// Kind of price / RSI divergence.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
pub enum DivergenceKind {
    Bullish,
    Bearish,
}

/// Price / RSI divergence across two adjacent windows, with a [0, 100] strength.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct Divergence {
    pub kind: DivergenceKind,
    pub strength: f64,
}

fn extreme_index(values: &[f64], highest: bool) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, values[0]), |(best_index, best), (index, value)| {
            let better = if highest { *value > best } else { *value < best };
            if better {
                (index, *value)
            } else {
                (best_index, best)
            }
        })
        .0
}

/// Compare price & RSI extremes of the previous and the most recent `lookback` bars.
///
/// Bullish: the recent window makes a lower price low with a higher RSI low.
/// Bearish: the recent window makes a higher price high with a lower RSI high.
pub fn divergence(closes: &[f64], rsi_period: usize, lookback: usize) -> Option<Divergence> {
    if lookback == 0 || closes.len() < 2 * lookback + rsi_period + 1 {
        return None;
    }

    let rsi = rsi_series(closes, rsi_period);
    let split = closes.len() - lookback;
    let start = split - lookback;

    let (prev_price, recent_price) = (&closes[start..split], &closes[split..]);
    let (prev_rsi, recent_rsi) = (&rsi[start..split], &rsi[split..]);

    let strength = |price_prev: f64, price_recent: f64, rsi_prev: f64, rsi_recent: f64| {
        let price_gap = if price_prev != 0.0 {
            ((price_recent - price_prev) / price_prev * 100.0).abs()
        } else {
            0.0
        };
        let rsi_gap = (rsi_recent - rsi_prev).abs();
        (rsi_gap * 2.0 + price_gap * 10.0).clamp(0.0, 100.0)
    };

    let prev_low = extreme_index(prev_price, false);
    let recent_low = extreme_index(recent_price, false);
    if recent_price[recent_low] < prev_price[prev_low] && recent_rsi[recent_low] > prev_rsi[prev_low]
    {
        return Some(Divergence {
            kind: DivergenceKind::Bullish,
            strength: strength(
                prev_price[prev_low],
                recent_price[recent_low],
                prev_rsi[prev_low],
                recent_rsi[recent_low],
            ),
        });
    }

    let prev_high = extreme_index(prev_price, true);
    let recent_high = extreme_index(recent_price, true);
    if recent_price[recent_high] > prev_price[prev_high]
        && recent_rsi[recent_high] < prev_rsi[prev_high]
    {
        return Some(Divergence {
            kind: DivergenceKind::Bearish,
            strength: strength(
                prev_price[prev_high],
                recent_price[recent_high],
                prev_rsi[prev_high],
                recent_rsi[recent_high],
            ),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trend_classification() {
        let rising = (0..60).map(|i| 100.0 + i as f64).collect::<Vec<_>>();
        let state = trend(&rising, 20, 50, 10);
        assert_eq!(state.trend, Trend::Up);
        assert!(state.strength > 0.5 && state.strength <= 1.0);

        let falling = rising.iter().rev().copied().collect::<Vec<_>>();
        assert_eq!(trend(&falling, 20, 50, 10).trend, Trend::Down);

        let flat = vec![100.0; 60];
        let state = trend(&flat, 20, 50, 10);
        assert_eq!(state.trend, Trend::Sideways);
        assert_eq!(state.strength, 0.0);
    }

    #[test]
    fn test_trend_short_history_is_default() {
        assert_eq!(trend(&[1.0, 2.0], 20, 50, 10), TrendState::default());
    }

    #[test]
    fn test_bullish_divergence() {
        // Sharp sell-off to a low, then a slow grind to a marginally lower low
        let mut closes = vec![100.0; 15];
        closes.extend([98.0, 96.0, 94.0, 92.0, 90.0, 91.0, 92.0, 93.0, 94.0, 95.0]);
        closes.extend([94.5, 94.0, 93.5, 93.0, 92.5, 92.0, 91.5, 91.0, 90.5, 89.9]);

        let divergence = divergence(&closes, 14, 10).unwrap();
        assert_eq!(divergence.kind, DivergenceKind::Bullish);
        assert!(divergence.strength > 0.0 && divergence.strength <= 100.0);
    }

    #[test]
    fn test_divergence_requires_history() {
        assert_eq!(divergence(&[1.0; 10], 14, 10), None);
    }
}
