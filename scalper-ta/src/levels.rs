use derive_more::Display;
use scalper_instrument::Candle;
use serde::{Deserialize, Serialize};

/// How a [`SupportResistance`] pair was derived.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
pub enum LevelSource {
    /// Nearest local swing extrema around price.
    Swing,
    /// Classic floor-trader pivot fallback.
    Pivot,
}

/// Nearest support below and resistance above the latest price.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct SupportResistance {
    pub support: f64,
    pub resistance: f64,
    pub source: LevelSource,
}

impl SupportResistance {
    /// Distance from `price` down to support, as a percentage of price.
    pub fn support_distance_percent(&self, price: f64) -> f64 {
        if price == 0.0 {
            0.0
        } else {
            (price - self.support) / price * 100.0
        }
    }

    /// Distance from `price` up to resistance, as a percentage of price.
    pub fn resistance_distance_percent(&self, price: f64) -> f64 {
        if price == 0.0 {
            0.0
        } else {
            (self.resistance - price) / price * 100.0
        }
    }
}

/// Find the nearest swing support & resistance in the last `lookback` candles, falling back to
/// pivot points when either side has no swing level.
///
/// A swing high (low) is a bar whose high (low) is strictly above (below) the `strength` bars
/// either side of it.
pub fn support_resistance(
    candles: &[Candle],
    lookback: usize,
    strength: usize,
) -> Option<SupportResistance> {
    let price = candles.last()?.close;
    let window = &candles[candles.len().saturating_sub(lookback.max(1))..];

    let (mut support, mut resistance) = (None::<f64>, None::<f64>);
    if window.len() > 2 * strength {
        for index in strength..window.len() - strength {
            let neighbours = window[index - strength..=index + strength]
                .iter()
                .enumerate()
                .filter(|(offset, _)| *offset != strength)
                .map(|(_, candle)| candle)
                .collect::<Vec<_>>();

            let candidate = &window[index];
            if neighbours.iter().all(|other| candidate.high > other.high) && candidate.high > price
            {
                resistance = Some(resistance.map_or(candidate.high, |r| r.min(candidate.high)));
            }
            if neighbours.iter().all(|other| candidate.low < other.low) && candidate.low < price {
                support = Some(support.map_or(candidate.low, |s| s.max(candidate.low)));
            }
        }
    }

    match (support, resistance) {
        (Some(support), Some(resistance)) => Some(SupportResistance {
            support,
            resistance,
            source: LevelSource::Swing,
        }),
        _ => Some(pivot_levels(window)),
    }
}

/// Pivot `P = (H + L + C) / 3`, `S1 = 2P − H`, `R1 = 2P − L` over the window envelope.
pub fn pivot_levels(candles: &[Candle]) -> SupportResistance {
    let (high, low) = candles.iter().fold(
        (f64::NEG_INFINITY, f64::INFINITY),
        |(high, low), candle| (high.max(candle.high), low.min(candle.low)),
    );
    let close = candles.last().map(|candle| candle.close).unwrap_or_default();
    if !high.is_finite() || !low.is_finite() {
        return SupportResistance {
            support: close,
            resistance: close,
            source: LevelSource::Pivot,
        };
    }

    let pivot = (high + low + close) / 3.0;
    SupportResistance {
        support: 2.0 * pivot - high,
        resistance: 2.0 * pivot - low,
        source: LevelSource::Pivot,
    }
}
