use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable OHLCV candle as delivered by an exchange klines endpoint.
///
/// Times are (de)serialised as epoch milliseconds.
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd, Deserialize, Serialize)]
pub struct Candle {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub close_time: DateTime<Utc>,
}

impl Candle {
    /// Absolute size of the candle body.
    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    /// Full high-to-low range.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Typical price `(high + low + close) / 3`.
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// Determine if the provided series is strictly increasing in `open_time`.
    pub fn is_ordered(series: &[Candle]) -> bool {
        series
            .windows(2)
            .all(|pair| pair[0].open_time < pair[1].open_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn candle(open: f64, high: f64, low: f64, close: f64, minute: i64) -> Candle {
        let open_time = DateTime::<Utc>::UNIX_EPOCH + TimeDelta::minutes(minute);
        Candle {
            open_time,
            open,
            high,
            low,
            close,
            volume: 1.0,
            close_time: open_time + TimeDelta::seconds(59),
        }
    }

    #[test]
    fn test_candle_anatomy() {
        let hammer = candle(100.0, 101.0, 95.0, 100.5, 0);
        assert!(hammer.is_bullish());
        assert_eq!(hammer.body(), 0.5);
        assert_eq!(hammer.range(), 6.0);
        assert_eq!(hammer.upper_wick(), 0.5);
        assert_eq!(hammer.lower_wick(), 5.0);
    }

    #[test]
    fn test_is_ordered() {
        let series = vec![candle(1.0, 1.0, 1.0, 1.0, 0), candle(1.0, 1.0, 1.0, 1.0, 1)];
        assert!(Candle::is_ordered(&series));

        let unordered = vec![series[1], series[0]];
        assert!(!Candle::is_ordered(&unordered));
    }

    #[test]
    fn test_candle_serde_epoch_millis() {
        let input = r#"{"open_time":60000,"open":1.0,"high":2.0,"low":0.5,"close":1.5,"volume":10.0,"close_time":119999}"#;
        let candle: Candle = serde_json::from_str(input).unwrap();
        assert_eq!(candle.open_time.timestamp_millis(), 60_000);
        assert_eq!(candle.close_time.timestamp_millis(), 119_999);
    }
}
