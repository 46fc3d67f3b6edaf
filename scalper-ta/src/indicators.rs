use crate::patterns::{Cross, crossover};
use scalper_instrument::Candle;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Neutral RSI reported when there is not enough history.
pub const RSI_NEUTRAL: f64 = 50.0;

/// Volume ratio reported when the volume history cannot be trusted.
pub const VOLUME_RATIO_NEUTRAL: f64 = 1.0;

/// Volume ratio reported when the recent volume is zero.
pub const VOLUME_RATIO_FLOOR: f64 = 0.01;

/// Simple moving average indicator.
#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl SimpleMovingAverage {
    /// Create a new SMA with the given period.
    pub fn new(period: usize) -> Self {
        Self {
            period: period.max(1),
            values: VecDeque::with_capacity(period.max(1)),
            sum: 0.0,
        }
    }

    /// Update the SMA with a new value and return the latest average.
    pub fn update(&mut self, value: f64) -> f64 {
        self.values.push_back(value);
        self.sum += value;
        if self.values.len() > self.period {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        self.average()
    }

    /// Current average value.
    pub fn average(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f64
        }
    }
}

/// Exponential moving average indicator, seeded with the first value it observes.
#[derive(Debug, Clone)]
pub struct ExponentialMovingAverage {
    multiplier: f64,
    value: Option<f64>,
}

impl ExponentialMovingAverage {
    /// Create a new EMA with the given period.
    pub fn new(period: usize) -> Self {
        let multiplier = 2.0 / (period as f64 + 1.0);
        Self {
            multiplier,
            value: None,
        }
    }

    /// Update the EMA with a new value and return the latest EMA.
    pub fn update(&mut self, value: f64) -> f64 {
        let next = match self.value {
            Some(prev) => prev + self.multiplier * (value - prev),
            None => value,
        };
        self.value = Some(next);
        next
    }

    /// Current EMA value if initialised.
    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// Mean of the last `period` values, or `None` if there are fewer than `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Full EMA series of `values`. The first element always equals `values[0]`.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut ema = ExponentialMovingAverage::new(period);
    values.iter().map(|value| ema.update(*value)).collect()
}

/// Latest EMA of `values`, or `None` if `values` is empty.
pub fn ema_last(values: &[f64], period: usize) -> Option<f64> {
    ema(values, period).last().copied()
}

/// Arithmetic mean, 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = mean(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Relative strength index from simple average gains and losses over the last `period`
/// changes.
///
/// Returns [`RSI_NEUTRAL`] when fewer than `period + 1` closes exist, and 100 when the average
/// loss is exactly zero.
pub fn rsi(closes: &[f64], period: usize) -> f64 {
    if period == 0 || closes.len() < period + 1 {
        return RSI_NEUTRAL;
    }

    let window = &closes[closes.len() - (period + 1)..];
    let (gains, losses) = window
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0.0, 0.0), |(gains, losses), change| {
            if change > 0.0 {
                (gains + change, losses)
            } else {
                (gains, losses - change)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return 100.0;
    }

    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}

/// RSI evaluated at every index of `closes` (neutral until enough history exists).
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<f64> {
    (1..=closes.len())
        .map(|end| rsi(&closes[..end], period))
        .collect()
}

/// Moving Average Convergence Divergence output for the latest bar.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    /// Histogram turned positive on the latest bar.
    pub bullish_cross: bool,
    /// Histogram turned negative on the latest bar.
    pub bearish_cross: bool,
}

/// MACD line = EMA(fast) − EMA(slow), signal = EMA(MACD, signal_period).
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal_period: usize) -> Macd {
    if closes.is_empty() {
        return Macd::default();
    }

    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    let macd_line = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(fast, slow)| fast - slow)
        .collect::<Vec<_>>();
    let signal_line = ema(&macd_line, signal_period);

    let last = macd_line.len() - 1;
    let macd = macd_line[last];
    let signal = signal_line[last];

    let cross = if last > 0 {
        crossover(
            macd_line[last - 1],
            signal_line[last - 1],
            macd,
            signal,
        )
    } else {
        None
    };

    Macd {
        macd,
        signal,
        histogram: macd - signal,
        bullish_cross: cross == Some(Cross::Above),
        bearish_cross: cross == Some(Cross::Below),
    }
}

/// Bollinger Bands for the latest bar.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Bollinger {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// Position of price within the bands, 0.0 at the lower band and 1.0 at the upper band.
    pub percent_b: f64,
    /// Band width as a percentage of the middle band.
    pub width_percent: f64,
}

/// SMA(period) ± std_devs·σ, with %B fixed at 0.5 if the bands collapse.
pub fn bollinger(closes: &[f64], period: usize, std_devs: f64) -> Bollinger {
    let period = period.min(closes.len());
    let Some(middle) = sma(closes, period) else {
        return Bollinger::default();
    };

    let sigma = std_dev(&closes[closes.len() - period..]);
    let upper = middle + std_devs * sigma;
    let lower = middle - std_devs * sigma;
    let price = closes[closes.len() - 1];

    let band = upper - lower;
    let percent_b = if band > 0.0 {
        (price - lower) / band
    } else {
        0.5
    };
    let width_percent = if middle != 0.0 {
        band / middle * 100.0
    } else {
        0.0
    };

    Bollinger {
        upper,
        middle,
        lower,
        percent_b,
        width_percent,
    }
}

/// Stochastic oscillator for the latest bar.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Stochastic {
    pub k: f64,
    pub d: f64,
}

fn envelope(candles: &[Candle]) -> (f64, f64) {
    candles.iter().fold(
        (f64::NEG_INFINITY, f64::INFINITY),
        |(highest, lowest), candle| (highest.max(candle.high), lowest.min(candle.low)),
    )
}

fn stochastic_k(candles: &[Candle]) -> f64 {
    let Some(last) = candles.last() else {
        return 50.0;
    };
    let (highest, lowest) = envelope(candles);
    let range = highest - lowest;
    if range > 0.0 {
        100.0 * (last.close - lowest) / range
    } else {
        50.0
    }
}

/// %K over the trailing `period` bar high/low envelope, %D = SMA(%K, smoothing).
pub fn stochastic(candles: &[Candle], period: usize, smoothing: usize) -> Stochastic {
    if candles.is_empty() || period == 0 {
        return Stochastic { k: 50.0, d: 50.0 };
    }

    let smoothing = smoothing.max(1);
    let mut d = SimpleMovingAverage::new(smoothing);
    let first_end = candles.len().saturating_sub(smoothing - 1).max(1);

    let mut k = 50.0;
    let mut d_value = 50.0;
    for end in first_end..=candles.len() {
        let start = end.saturating_sub(period);
        k = stochastic_k(&candles[start..end]);
        d_value = d.update(k);
    }

    Stochastic { k, d: d_value }
}

/// Williams %R over the trailing `period` bars, within [-100, 0].
pub fn williams_r(candles: &[Candle], period: usize) -> f64 {
    if candles.is_empty() || period == 0 {
        return -50.0;
    }
    let window = &candles[candles.len().saturating_sub(period)..];
    let (highest, lowest) = envelope(window);
    let range = highest - lowest;
    if range <= 0.0 {
        return -50.0;
    }
    let close = window[window.len() - 1].close;
    (-100.0 * (highest - close) / range).clamp(-100.0, 0.0)
}

/// True range of `candle` given the previous close, if any.
pub fn true_range(candle: &Candle, prev_close: Option<f64>) -> f64 {
    let range = candle.high - candle.low;
    match prev_close {
        Some(prev) => range
            .max((candle.high - prev).abs())
            .max((candle.low - prev).abs()),
        None => range,
    }
}

/// Average true range: mean true range over the last `period` bars.
pub fn atr(candles: &[Candle], period: usize) -> f64 {
    if candles.is_empty() || period == 0 {
        return 0.0;
    }
    let start = candles.len().saturating_sub(period);
    let ranges = (start..candles.len())
        .map(|index| {
            let prev_close = index.checked_sub(1).map(|prev| candles[prev].close);
            true_range(&candles[index], prev_close)
        })
        .collect::<Vec<_>>();
    mean(&ranges)
}

/// Percentage change between the latest value and the value `lookback` bars earlier.
pub fn percent_change(values: &[f64], lookback: usize) -> f64 {
    if lookback == 0 || values.len() <= lookback {
        return 0.0;
    }
    let last = values[values.len() - 1];
    let base = values[values.len() - 1 - lookback];
    if base == 0.0 {
        0.0
    } else {
        (last - base) / base * 100.0
    }
}

fn is_valid_volume(volume: &f64) -> bool {
    volume.is_finite() && *volume > 0.0
}

/// Mean of the last `recent` valid volumes divided by the mean of the valid volumes in the
/// `window` bars preceding them.
///
/// Non-positive and non-finite volumes are discarded. Returns [`VOLUME_RATIO_NEUTRAL`] if less
/// than half of the inspected bars are valid or either side is empty after filtering, and
/// [`VOLUME_RATIO_FLOOR`] if the recent mean is zero.
pub fn volume_ratio(volumes: &[f64], window: usize, recent: usize) -> f64 {
    if recent == 0 || volumes.len() <= recent {
        return VOLUME_RATIO_NEUTRAL;
    }

    let start = volumes.len().saturating_sub(window + recent);
    let inspected = &volumes[start..];
    let (prior, latest) = inspected.split_at(inspected.len() - recent);

    let valid = inspected.iter().filter(|v| is_valid_volume(v)).count();
    if (valid as f64) < inspected.len() as f64 * 0.5 {
        return VOLUME_RATIO_NEUTRAL;
    }

    let latest = latest
        .iter()
        .copied()
        .filter(is_valid_volume)
        .collect::<Vec<_>>();
    let prior = prior
        .iter()
        .copied()
        .filter(is_valid_volume)
        .collect::<Vec<_>>();

    if latest.is_empty() || prior.is_empty() {
        return VOLUME_RATIO_NEUTRAL;
    }

    let recent_mean = mean(&latest);
    if recent_mean <= 0.0 {
        return VOLUME_RATIO_FLOOR;
    }

    let prior_mean = mean(&prior);
    if prior_mean <= 0.0 {
        return VOLUME_RATIO_NEUTRAL;
    }

    recent_mean / prior_mean
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_and_ema_streams() {
        let mut sma = SimpleMovingAverage::new(3);
        assert_eq!(sma.update(1.0), 1.0);
        assert_eq!(sma.update(2.0), 1.5);
        assert_eq!(sma.update(3.0), 2.0);
        assert_eq!(sma.update(4.0), 3.0);

        let mut ema = ExponentialMovingAverage::new(3);
        assert_eq!(ema.value(), None);
        assert_eq!(ema.update(1.0), 1.0);
        assert_eq!(ema.update(2.0), 1.5);
    }

    #[test]
    fn test_sma_window() {
        assert_eq!(sma(&[1.0, 2.0, 3.0, 4.0], 2), Some(3.5));
        assert_eq!(sma(&[1.0], 2), None);
        assert_eq!(sma(&[1.0, 2.0], 0), None);
    }

    #[test]
    fn test_ema_seeded_with_first_value() {
        let inputs: [&[f64]; 4] = [&[42.0], &[3.0, 9.0, 1.0], &[-5.5, 0.0], &[0.0; 10]];
        for (index, input) in inputs.into_iter().enumerate() {
            for period in [1, 2, 9, 50] {
                assert_eq!(ema(input, period)[0], input[0], "TC{index} period {period}");
            }
        }
        assert!(ema(&[], 9).is_empty());
    }

    #[test]
    fn test_rsi() {
        struct TestCase {
            closes: Vec<f64>,
            period: usize,
            expected: f64,
        }

        let cases = vec![
            // TC0: short history is neutral
            TestCase {
                closes: vec![1.0, 2.0],
                period: 14,
                expected: 50.0,
            },
            // TC1: no losses
            TestCase {
                closes: vec![1.0, 2.0, 3.0, 4.0],
                period: 3,
                expected: 100.0,
            },
            // TC2: no gains
            TestCase {
                closes: vec![4.0, 3.0, 2.0, 1.0],
                period: 3,
                expected: 0.0,
            },
            // TC3: equal gains and losses
            TestCase {
                closes: vec![1.0, 2.0, 1.0],
                period: 2,
                expected: 50.0,
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            let actual = rsi(&test.closes, test.period);
            assert!((actual - test.expected).abs() < 1e-9, "TC{index} failed: {actual}");
        }
    }

    #[test]
    fn test_bollinger_collapsed_bands() {
        let bands = bollinger(&[10.0; 20], 20, 2.0);
        assert_eq!(bands.upper, 10.0);
        assert_eq!(bands.lower, 10.0);
        assert_eq!(bands.percent_b, 0.5);
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(&[100.0, 101.0, 110.0], 2), 10.0);
        assert_eq!(percent_change(&[100.0], 2), 0.0);
    }

    #[test]
    fn test_volume_ratio_reference_window() {
        let mut volumes = vec![4078.41; 24];
        volumes.extend([798.5, 2626.9, 3207.9]);

        let ratio = volume_ratio(&volumes, 24, 3);
        assert!((ratio - 0.542).abs() < 0.001, "ratio: {ratio}");
    }

    #[test]
    fn test_volume_ratio_degenerate_inputs() {
        struct TestCase {
            volumes: Vec<f64>,
            expected: f64,
        }

        let cases = vec![
            // TC0: mostly invalid history
            TestCase {
                volumes: vec![0.0, f64::NAN, -1.0, 0.0, 10.0, 10.0, 10.0],
                expected: VOLUME_RATIO_NEUTRAL,
            },
            // TC1: recent bars all invalid
            TestCase {
                volumes: vec![10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 0.0, 0.0, f64::NAN],
                expected: VOLUME_RATIO_NEUTRAL,
            },
            // TC2: not enough bars
            TestCase {
                volumes: vec![10.0, 10.0],
                expected: VOLUME_RATIO_NEUTRAL,
            },
            // TC3: invalid prior bars are skipped
            TestCase {
                volumes: vec![10.0, 0.0, 10.0, 20.0, 20.0, 20.0],
                expected: 2.0,
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            let actual = volume_ratio(&test.volumes, 20, 3);
            assert_eq!(actual, test.expected, "TC{index} failed");
        }
    }
}
