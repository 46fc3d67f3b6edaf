use derive_more::Display;
use scalper_instrument::Candle;
use serde::{Deserialize, Serialize};

/// Type of crossover event detected between two data series.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Cross {
    Above,
    Below,
}

/// Determine if a crossover occurred between the previous and current values.
pub fn crossover(prev_fast: f64, prev_slow: f64, fast: f64, slow: f64) -> Option<Cross> {
    if prev_fast <= prev_slow && fast > slow {
        Some(Cross::Above)
    } else if prev_fast >= prev_slow && fast < slow {
        Some(Cross::Below)
    } else {
        None
    }
}

/// Directional bias implied by a [`CandlePattern`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
pub enum PatternBias {
    Bullish,
    Bearish,
}

/// Reversal / continuation patterns recognised on the last two or three candles.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
pub enum CandlePattern {
    #[display("bullish_engulfing")]
    BullishEngulfing,
    #[display("bearish_engulfing")]
    BearishEngulfing,
    #[display("hammer")]
    Hammer,
    #[display("shooting_star")]
    ShootingStar,
    #[display("three_white_soldiers")]
    ThreeWhiteSoldiers,
    #[display("three_black_crows")]
    ThreeBlackCrows,
}

impl CandlePattern {
    pub fn bias(&self) -> PatternBias {
        match self {
            CandlePattern::BullishEngulfing
            | CandlePattern::Hammer
            | CandlePattern::ThreeWhiteSoldiers => PatternBias::Bullish,
            CandlePattern::BearishEngulfing
            | CandlePattern::ShootingStar
            | CandlePattern::ThreeBlackCrows => PatternBias::Bearish,
        }
    }
}

/// Minimum body-to-range ratio for a candle to count as a "strong" soldier or crow.
const STRONG_BODY_RATIO: f64 = 0.5;

/// Minimum wick-to-body ratio of the dominant wick for hammers and shooting stars.
const WICK_BODY_RATIO: f64 = 2.0;

/// Detect the most significant pattern formed by the final candles of the series.
///
/// Three-bar patterns take precedence over engulfing patterns, which take precedence over
/// single-bar patterns.
pub fn detect_candle_pattern(candles: &[Candle]) -> Option<CandlePattern> {
    three_bar_pattern(candles)
        .or_else(|| engulfing_pattern(candles))
        .or_else(|| single_bar_pattern(candles))
}

fn is_strong(candle: &Candle) -> bool {
    let range = candle.range();
    range > 0.0 && candle.body() / range >= STRONG_BODY_RATIO
}

fn three_bar_pattern(candles: &[Candle]) -> Option<CandlePattern> {
    let [first, second, third] = candles.last_chunk::<3>()?;
    let bars = [first, second, third];

    let soldiers = bars.iter().all(|bar| bar.is_bullish() && is_strong(bar))
        && first.close < second.close
        && second.close < third.close;
    if soldiers {
        return Some(CandlePattern::ThreeWhiteSoldiers);
    }

    let crows = bars.iter().all(|bar| bar.is_bearish() && is_strong(bar))
        && first.close > second.close
        && second.close > third.close;
    crows.then_some(CandlePattern::ThreeBlackCrows)
}

fn engulfing_pattern(candles: &[Candle]) -> Option<CandlePattern> {
    let [prev, curr] = candles.last_chunk::<2>()?;

    if prev.is_bearish()
        && curr.is_bullish()
        && curr.open <= prev.close
        && curr.close >= prev.open
        && curr.body() > prev.body()
    {
        return Some(CandlePattern::BullishEngulfing);
    }

    if prev.is_bullish()
        && curr.is_bearish()
        && curr.open >= prev.close
        && curr.close <= prev.open
        && curr.body() > prev.body()
    {
        return Some(CandlePattern::BearishEngulfing);
    }

    None
}

fn single_bar_pattern(candles: &[Candle]) -> Option<CandlePattern> {
    let last = candles.last()?;
    let body = last.body();
    if body <= 0.0 || last.range() <= 0.0 {
        return None;
    }

    if last.lower_wick() >= WICK_BODY_RATIO * body && last.upper_wick() <= body {
        return Some(CandlePattern::Hammer);
    }

    if last.upper_wick() >= WICK_BODY_RATIO * body && last.lower_wick() <= body {
        return Some(CandlePattern::ShootingStar);
    }

    None
}

/// Number of consecutive bullish candles ending at the latest candle.
pub fn consecutive_bullish(candles: &[Candle]) -> usize {
    candles
        .iter()
        .rev()
        .take_while(|candle| candle.is_bullish())
        .count()
}

/// True if each of the last `count` candles made a higher low than the one before it.
pub fn higher_lows(candles: &[Candle], count: usize) -> bool {
    if count == 0 || candles.len() < count + 1 {
        return false;
    }
    candles[candles.len() - (count + 1)..]
        .windows(2)
        .all(|pair| pair[1].low > pair[0].low)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, Utc};

    fn candle(index: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
        let open_time = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::minutes(index);
        Candle {
            open_time,
            open,
            high,
            low,
            close,
            volume: 100.0,
            close_time: open_time + TimeDelta::seconds(59),
        }
    }

    #[test]
    fn test_crossover_pattern() {
        assert_eq!(crossover(1.0, 2.0, 3.0, 2.0), Some(Cross::Above));
        assert_eq!(crossover(3.0, 2.0, 1.0, 2.0), Some(Cross::Below));
        assert_eq!(crossover(3.0, 2.0, 4.0, 2.0), None);
    }

    #[test]
    fn test_detect_candle_pattern() {
        struct TestCase {
            candles: Vec<Candle>,
            expected: Option<CandlePattern>,
        }

        let cases = vec![
            // TC0: bullish engulfing
            TestCase {
                candles: vec![
                    candle(0, 102.0, 102.5, 100.5, 101.0),
                    candle(1, 100.8, 103.5, 100.6, 103.0),
                ],
                expected: Some(CandlePattern::BullishEngulfing),
            },
            // TC1: bearish engulfing
            TestCase {
                candles: vec![
                    candle(0, 100.0, 101.2, 99.8, 101.0),
                    candle(1, 101.2, 101.3, 99.0, 99.5),
                ],
                expected: Some(CandlePattern::BearishEngulfing),
            },
            // TC2: hammer
            TestCase {
                candles: vec![candle(0, 100.0, 100.6, 97.0, 100.5)],
                expected: Some(CandlePattern::Hammer),
            },
            // TC3: shooting star
            TestCase {
                candles: vec![candle(0, 100.5, 104.0, 99.9, 100.0)],
                expected: Some(CandlePattern::ShootingStar),
            },
            // TC4: three white soldiers
            TestCase {
                candles: vec![
                    candle(0, 100.0, 101.1, 99.9, 101.0),
                    candle(1, 101.0, 102.1, 100.9, 102.0),
                    candle(2, 102.0, 103.1, 101.9, 103.0),
                ],
                expected: Some(CandlePattern::ThreeWhiteSoldiers),
            },
            // TC5: three black crows
            TestCase {
                candles: vec![
                    candle(0, 103.0, 103.1, 101.9, 102.0),
                    candle(1, 102.0, 102.1, 100.9, 101.0),
                    candle(2, 101.0, 101.1, 99.9, 100.0),
                ],
                expected: Some(CandlePattern::ThreeBlackCrows),
            },
            // TC6: doji has no pattern
            TestCase {
                candles: vec![candle(0, 100.0, 101.0, 99.0, 100.0)],
                expected: None,
            },
            // TC7: empty series
            TestCase {
                candles: vec![],
                expected: None,
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            assert_eq!(
                detect_candle_pattern(&test.candles),
                test.expected,
                "TC{index} failed"
            );
        }
    }

    #[test]
    fn test_consecutive_bullish_and_higher_lows() {
        let candles = vec![
            candle(0, 101.0, 101.5, 99.0, 100.0),
            candle(1, 100.0, 101.0, 99.5, 100.8),
            candle(2, 100.8, 101.8, 100.2, 101.5),
        ];
        assert_eq!(consecutive_bullish(&candles), 2);
        assert!(higher_lows(&candles, 2));
        assert!(!higher_lows(&candles, 3));
    }
}
