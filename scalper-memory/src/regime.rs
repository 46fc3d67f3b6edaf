use crate::trade::{Outcome, PatternStats};
use chrono::{DateTime, TimeDelta, Utc};
use derive_more::Display;
use fnv::FnvHashMap;
use itertools::Itertools;
use scalper_instrument::Symbol;
use scalper_ta::{IndicatorSnapshot, Trend};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::info;

/// Market regime classified from an [`IndicatorSnapshot`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Deserialize, Serialize, Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Regime {
    #[display("TRENDING_UP")]
    TrendingUp,
    #[display("TRENDING_DOWN")]
    TrendingDown,
    #[default]
    #[display("RANGING")]
    Ranging,
    #[display("VOLATILE")]
    Volatile,
    #[display("BREAKOUT")]
    Breakout,
}

/// Position sizing & exit multipliers applied while a [`Regime`] is active.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct RegimeMultipliers {
    pub size: f64,
    pub stop: f64,
    pub target: f64,
}

impl RegimeMultipliers {
    pub const NEUTRAL: Self = Self {
        size: 1.0,
        stop: 1.0,
        target: 1.0,
    };
}

/// Classification thresholds & per-regime multipliers.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RegimeConfig {
    /// Minimum time a regime must be held before a transition is accepted.
    pub min_dwell_secs: i64,
    pub history_capacity: usize,
    /// Symbols whose regime is tracked, evicting the least recently observed.
    pub max_symbols: usize,
    pub volatile_atr_percent: f64,
    pub volatile_band_width: f64,
    pub breakout_volume_ratio: f64,
    pub trending_strength: f64,
    /// Trades required in a regime before its win rate adjusts confidence.
    pub min_trades: u32,
    pub trending: RegimeMultipliers,
    pub ranging: RegimeMultipliers,
    pub volatile: RegimeMultipliers,
    pub breakout: RegimeMultipliers,
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            min_dwell_secs: 300,
            history_capacity: 100,
            max_symbols: 200,
            volatile_atr_percent: 1.2,
            volatile_band_width: 4.0,
            breakout_volume_ratio: 1.8,
            trending_strength: 0.5,
            min_trades: 5,
            trending: RegimeMultipliers {
                size: 1.0,
                stop: 1.0,
                target: 1.2,
            },
            ranging: RegimeMultipliers {
                size: 0.8,
                stop: 0.8,
                target: 0.8,
            },
            volatile: RegimeMultipliers {
                size: 0.5,
                stop: 1.5,
                target: 1.5,
            },
            breakout: RegimeMultipliers {
                size: 1.0,
                stop: 1.2,
                target: 1.5,
            },
        }
    }
}

impl RegimeConfig {
    pub fn multipliers(&self, regime: Regime) -> RegimeMultipliers {
        match regime {
            Regime::TrendingUp | Regime::TrendingDown => self.trending,
            Regime::Ranging => self.ranging,
            Regime::Volatile => self.volatile,
            Regime::Breakout => self.breakout,
        }
    }
}

/// Classify a snapshot. First match wins: breakout, volatile, trending, ranging.
pub fn classify(snapshot: &IndicatorSnapshot, config: &RegimeConfig) -> Regime {
    let band = &snapshot.bollinger;
    let outside_bands = band.percent_b > 1.0 || band.percent_b < 0.0;

    if outside_bands && snapshot.volume_ratio >= config.breakout_volume_ratio {
        Regime::Breakout
    } else if snapshot.atr_percent >= config.volatile_atr_percent
        || band.width_percent >= config.volatile_band_width
    {
        Regime::Volatile
    } else if snapshot.trend_strength >= config.trending_strength {
        match snapshot.trend {
            Trend::Up => Regime::TrendingUp,
            Trend::Down => Regime::TrendingDown,
            Trend::Sideways => Regime::Ranging,
        }
    } else {
        Regime::Ranging
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeTransition {
    pub symbol: Symbol,
    pub from: Regime,
    pub to: Regime,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub at: DateTime<Utc>,
}

/// Adjustments for the currently active regime.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct RegimeAdjustment {
    pub regime: Regime,
    pub multipliers: RegimeMultipliers,
    /// `clamp(0.8 + 0.4 * win_rate, 0.8, 1.2)` once enough trades, otherwise 1.0.
    pub confidence_multiplier: f64,
}

/// Debounced regime of a single symbol.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRegime {
    pub current: Regime,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub since: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_observed: DateTime<Utc>,
}

/// Persisted state of the [`RegimeTracker`].
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeState {
    pub symbols: FnvHashMap<Symbol, SymbolRegime>,
    pub history: VecDeque<RegimeTransition>,
    /// Trade performance per regime, shared by every symbol.
    pub performance: FnvHashMap<Regime, PatternStats>,
}

/// Tracks the active regime of each symbol and how trades perform in each regime.
#[derive(Debug, Clone, Default)]
pub struct RegimeTracker {
    config: RegimeConfig,
    state: RegimeState,
}

impl RegimeTracker {
    pub fn new(config: RegimeConfig) -> Self {
        Self::from_state(config, RegimeState::default())
    }

    pub fn from_state(config: RegimeConfig, state: RegimeState) -> Self {
        Self { config, state }
    }

    /// Active regime of `symbol`, [`Regime::Ranging`] until it is first observed.
    pub fn current(&self, symbol: &Symbol) -> Regime {
        self.state
            .symbols
            .get(symbol)
            .map_or_else(Regime::default, |tracked| tracked.current)
    }

    /// Number of symbols whose regime is tracked.
    pub fn len(&self) -> usize {
        self.state.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.symbols.is_empty()
    }

    pub fn state(&self) -> &RegimeState {
        &self.state
    }

    /// Classify `snapshot` and transition `symbol` to the new regime if its current one has
    /// been held for at least the minimum dwell time. Returns the symbol's active regime.
    pub fn observe(
        &mut self,
        symbol: &Symbol,
        snapshot: &IndicatorSnapshot,
        now: DateTime<Utc>,
    ) -> Regime {
        let candidate = classify(snapshot, &self.config);

        let Some(tracked) = self.state.symbols.get_mut(symbol) else {
            self.state.symbols.insert(
                symbol.clone(),
                SymbolRegime {
                    current: candidate,
                    since: now,
                    last_observed: now,
                },
            );
            self.evict(symbol);
            return candidate;
        };
        tracked.last_observed = now;

        if candidate != tracked.current
            && now - tracked.since >= TimeDelta::seconds(self.config.min_dwell_secs)
        {
            info!(%symbol, from = %tracked.current, to = %candidate, "market regime transition");
            self.state.history.push_back(RegimeTransition {
                symbol: symbol.clone(),
                from: tracked.current,
                to: candidate,
                at: now,
            });
            tracked.current = candidate;
            tracked.since = now;
            while self.state.history.len() > self.config.history_capacity {
                self.state.history.pop_front();
            }
        }

        tracked.current
    }

    /// Drop the least recently observed symbols, never `protected`.
    fn evict(&mut self, protected: &Symbol) {
        let excess = self
            .state
            .symbols
            .len()
            .saturating_sub(self.config.max_symbols);
        if excess == 0 {
            return;
        }

        let stale = self
            .state
            .symbols
            .iter()
            .filter(|(symbol, _)| *symbol != protected)
            .sorted_by(|(a_symbol, a), (b_symbol, b)| {
                a.last_observed
                    .cmp(&b.last_observed)
                    .then_with(|| a_symbol.cmp(b_symbol))
            })
            .take(excess)
            .map(|(symbol, _)| symbol.clone())
            .collect::<Vec<_>>();

        for symbol in stale {
            self.state.symbols.remove(&symbol);
        }
    }

    pub fn record_outcome(&mut self, regime: Regime, outcome: Outcome, roe: f64) {
        self.state
            .performance
            .entry(regime)
            .or_default()
            .record(outcome, roe);
    }

    /// Adjustment for the active regime of `symbol`.
    pub fn adjustment(&self, symbol: &Symbol) -> RegimeAdjustment {
        self.adjustment_for(self.current(symbol))
    }

    pub fn adjustment_for(&self, regime: Regime) -> RegimeAdjustment {
        let confidence_multiplier = self
            .state
            .performance
            .get(&regime)
            .filter(|stats| stats.total_trades >= self.config.min_trades)
            .map_or(1.0, |stats| (0.8 + 0.4 * stats.win_rate).clamp(0.8, 1.2));

        RegimeAdjustment {
            regime,
            multipliers: self.config.multipliers(regime),
            confidence_multiplier,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::trade::tests::time;
    use scalper_ta::indicators::{Bollinger, Macd, Stochastic};

    pub(crate) fn snapshot() -> IndicatorSnapshot {
        IndicatorSnapshot {
            price: 100.0,
            rsi: 50.0,
            momentum: 0.0,
            roc: 0.0,
            volume_ratio: 1.0,
            trend: Trend::Sideways,
            trend_strength: 0.1,
            sma_fast: 100.0,
            sma_slow: 100.0,
            ema9: 100.0,
            ema21: 100.0,
            ema50: 100.0,
            macd: Macd::default(),
            bollinger: Bollinger {
                upper: 101.0,
                middle: 100.0,
                lower: 99.0,
                percent_b: 0.5,
                width_percent: 2.0,
            },
            stochastic: Stochastic::default(),
            williams_r: -50.0,
            atr: 0.4,
            atr_percent: 0.4,
            divergence: None,
        }
    }

    #[test]
    fn test_classify() {
        let config = RegimeConfig::default();

        struct TestCase {
            snapshot: IndicatorSnapshot,
            expected: Regime,
        }

        let base = snapshot();
        let cases = vec![
            // TC0: quiet market
            TestCase {
                snapshot: base,
                expected: Regime::Ranging,
            },
            // TC1: high ATR%
            TestCase {
                snapshot: IndicatorSnapshot {
                    atr_percent: 1.5,
                    ..base
                },
                expected: Regime::Volatile,
            },
            // TC2: wide bands
            TestCase {
                snapshot: IndicatorSnapshot {
                    bollinger: Bollinger {
                        width_percent: 4.5,
                        ..base.bollinger
                    },
                    ..base
                },
                expected: Regime::Volatile,
            },
            // TC3: close above upper band on volume beats volatility
            TestCase {
                snapshot: IndicatorSnapshot {
                    atr_percent: 1.5,
                    volume_ratio: 2.0,
                    bollinger: Bollinger {
                        percent_b: 1.1,
                        ..base.bollinger
                    },
                    ..base
                },
                expected: Regime::Breakout,
            },
            // TC4: outside bands without volume is not a breakout
            TestCase {
                snapshot: IndicatorSnapshot {
                    volume_ratio: 1.0,
                    bollinger: Bollinger {
                        percent_b: -0.1,
                        ..base.bollinger
                    },
                    ..base
                },
                expected: Regime::Ranging,
            },
            // TC5: strong downtrend
            TestCase {
                snapshot: IndicatorSnapshot {
                    trend: Trend::Down,
                    trend_strength: 0.7,
                    ..base
                },
                expected: Regime::TrendingDown,
            },
            // TC6: weak uptrend
            TestCase {
                snapshot: IndicatorSnapshot {
                    trend: Trend::Up,
                    trend_strength: 0.3,
                    ..base
                },
                expected: Regime::Ranging,
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            assert_eq!(classify(&test.snapshot, &config), test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_observe_debounces_by_dwell_time() {
        let mut tracker = RegimeTracker::new(RegimeConfig::default());
        let btc = Symbol::from("BTCUSDT");
        let volatile = IndicatorSnapshot {
            atr_percent: 2.0,
            ..snapshot()
        };

        assert_eq!(tracker.observe(&btc, &snapshot(), time(10, 0)), Regime::Ranging);
        // 2 minutes in: too early to switch
        assert_eq!(tracker.observe(&btc, &volatile, time(10, 2)), Regime::Ranging);
        // 5 minutes in: switch accepted
        assert_eq!(tracker.observe(&btc, &volatile, time(10, 5)), Regime::Volatile);
        assert_eq!(tracker.state().history.len(), 1);
        assert_eq!(tracker.state().history[0].symbol, btc);
        // Dwell clock restarted at the transition
        assert_eq!(tracker.observe(&btc, &snapshot(), time(10, 8)), Regime::Volatile);
    }

    #[test]
    fn test_symbols_tracked_independently() {
        let mut tracker = RegimeTracker::new(RegimeConfig::default());
        let btc = Symbol::from("BTCUSDT");
        let eth = Symbol::from("ETHUSDT");
        let trending = IndicatorSnapshot {
            trend: Trend::Up,
            trend_strength: 0.8,
            ..snapshot()
        };
        let volatile = IndicatorSnapshot {
            atr_percent: 2.0,
            ..snapshot()
        };

        assert_eq!(tracker.observe(&btc, &trending, time(10, 0)), Regime::TrendingUp);
        assert_eq!(tracker.observe(&eth, &volatile, time(10, 0)), Regime::Volatile);

        // Past the dwell time, alternating scans never leak one symbol's regime into another
        for minute in 6..12 {
            assert_eq!(tracker.observe(&btc, &trending, time(10, minute)), Regime::TrendingUp);
            assert_eq!(tracker.observe(&eth, &volatile, time(10, minute)), Regime::Volatile);
        }
        assert!(tracker.state().history.is_empty());

        assert_eq!(tracker.adjustment(&btc).multipliers, RegimeConfig::default().trending);
        assert_eq!(tracker.adjustment(&eth).multipliers, RegimeConfig::default().volatile);
        assert_eq!(tracker.current(&Symbol::from("SOLUSDT")), Regime::Ranging);
    }

    #[test]
    fn test_symbols_are_bounded() {
        let mut tracker = RegimeTracker::new(RegimeConfig {
            max_symbols: 2,
            ..RegimeConfig::default()
        });

        for (minute, symbol) in ["AUSDT", "BUSDT", "CUSDT"].into_iter().enumerate() {
            tracker.observe(&Symbol::from(symbol), &snapshot(), time(10, minute as u32));
        }

        assert_eq!(tracker.len(), 2);
        assert!(!tracker.state().symbols.contains_key(&Symbol::from("AUSDT")));
        assert!(tracker.state().symbols.contains_key(&Symbol::from("CUSDT")));
    }

    #[test]
    fn test_history_is_bounded() {
        let config = RegimeConfig {
            min_dwell_secs: 0,
            history_capacity: 3,
            ..RegimeConfig::default()
        };
        let mut tracker = RegimeTracker::new(config);
        let volatile = IndicatorSnapshot {
            atr_percent: 2.0,
            ..snapshot()
        };

        for minute in 0..10 {
            let observed = if minute % 2 == 0 { snapshot() } else { volatile };
            tracker.observe(&Symbol::from("BTCUSDT"), &observed, time(11, minute));
        }
        assert_eq!(tracker.state().history.len(), 3);
    }

    #[test]
    fn test_confidence_multiplier() {
        let mut tracker = RegimeTracker::new(RegimeConfig::default());
        assert_eq!(tracker.adjustment(&Symbol::from("BTCUSDT")).confidence_multiplier, 1.0);

        for _ in 0..4 {
            tracker.record_outcome(Regime::Ranging, Outcome::Win, 2.0);
        }
        // under-sampled
        assert_eq!(tracker.adjustment(&Symbol::from("BTCUSDT")).confidence_multiplier, 1.0);

        tracker.record_outcome(Regime::Ranging, Outcome::Loss, -2.0);
        // win rate 0.8 => 0.8 + 0.32
        let adjustment = tracker.adjustment_for(Regime::Ranging);
        assert!((adjustment.confidence_multiplier - 1.12).abs() < 1e-9);
        assert_eq!(adjustment.multipliers, RegimeConfig::default().ranging);
    }
}
