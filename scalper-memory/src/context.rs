use crate::trade::{Outcome, TradeMemory};
use chrono::{DateTime, TimeDelta, Utc};
use fnv::FnvHashMap;
use scalper_instrument::{Side, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Tunables of [`ContextualMemory`].
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Entries kept per symbol.
    pub max_entries: usize,
    pub expiry_secs: i64,
    pub winner_boost: f64,
    pub max_winner_boost: f64,
    pub loser_penalty: f64,
    pub max_loser_penalty: f64,
    pub streak_length: usize,
    pub win_streak_boost: f64,
    pub loss_streak_penalty: f64,
    pub max_adjustment: f64,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_entries: 20,
            expiry_secs: 3_600,
            winner_boost: 3.0,
            max_winner_boost: 6.0,
            loser_penalty: 4.0,
            max_loser_penalty: 8.0,
            streak_length: 3,
            win_streak_boost: 3.0,
            loss_streak_penalty: 5.0,
            max_adjustment: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum ContextKind {
    Outcome {
        outcome: Outcome,
        side: Side,
        combo_tag: String,
        roe: f64,
    },
    /// Free-form market event, eg/ "funding spike".
    Event(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContextEntry {
    pub at: DateTime<Utc>,
    pub kind: ContextKind,
}

/// Short-lived, per-symbol window of recent outcomes & events.
#[derive(Debug, Clone, Default)]
pub struct ContextualMemory {
    config: ContextConfig,
    entries: FnvHashMap<Symbol, VecDeque<ContextEntry>>,
}

impl ContextualMemory {
    pub fn new(config: ContextConfig) -> Self {
        Self {
            config,
            entries: FnvHashMap::default(),
        }
    }

    pub fn record_trade(&mut self, trade: &TradeMemory) {
        self.push(
            trade.symbol().clone(),
            ContextEntry {
                at: trade.exit.exit_time,
                kind: ContextKind::Outcome {
                    outcome: trade.outcome,
                    side: trade.entry.side,
                    combo_tag: trade.entry.combo_tag.clone(),
                    roe: trade.roe(),
                },
            },
        );
    }

    pub fn record_event(&mut self, symbol: Symbol, description: impl Into<String>, at: DateTime<Utc>) {
        self.push(
            symbol,
            ContextEntry {
                at,
                kind: ContextKind::Event(description.into()),
            },
        );
    }

    /// Unexpired entries for `symbol`, oldest first.
    pub fn recent<'a>(
        &'a self,
        symbol: &Symbol,
        now: DateTime<Utc>,
    ) -> impl Iterator<Item = &'a ContextEntry> + 'a {
        let expiry = TimeDelta::seconds(self.config.expiry_secs);
        self.entries
            .get(symbol)
            .into_iter()
            .flatten()
            .filter(move |entry| now - entry.at <= expiry)
    }

    /// Confidence adjustment for a candidate given the symbol's recent context.
    ///
    /// Similar recent winners boost, similar recent losers penalise, and an active streak of
    /// wins or losses on the symbol adds a further boost or penalty.
    pub fn boost(&self, symbol: &Symbol, side: Side, combo_tag: &str, now: DateTime<Utc>) -> f64 {
        let outcomes = self
            .recent(symbol, now)
            .filter_map(|entry| match &entry.kind {
                ContextKind::Outcome {
                    outcome,
                    side,
                    combo_tag,
                    ..
                } => Some((*outcome, *side, combo_tag.as_str())),
                ContextKind::Event(_) => None,
            })
            .collect::<Vec<_>>();

        let (winners, losers) = outcomes
            .iter()
            .filter(|(_, entry_side, entry_tag)| *entry_side == side && similar(entry_tag, combo_tag))
            .fold((0.0, 0.0), |(winners, losers), (outcome, _, _)| match outcome {
                Outcome::Win => (winners + self.config.winner_boost, losers),
                Outcome::Loss => (winners, losers + self.config.loser_penalty),
                Outcome::Breakeven => (winners, losers),
            });

        let adjustment = winners.min(self.config.max_winner_boost)
            - losers.min(self.config.max_loser_penalty)
            + self.streak_adjustment(&outcomes);

        adjustment.clamp(-self.config.max_adjustment, self.config.max_adjustment)
    }

    fn streak_adjustment(&self, outcomes: &[(Outcome, Side, &str)]) -> f64 {
        let mut decisive = outcomes
            .iter()
            .rev()
            .map(|(outcome, _, _)| *outcome)
            .filter(|outcome| *outcome != Outcome::Breakeven);

        let Some(last) = decisive.next() else {
            return 0.0;
        };
        let streak = 1 + decisive.take_while(|outcome| *outcome == last).count();

        match last {
            _ if streak < self.config.streak_length => 0.0,
            Outcome::Win => self.config.win_streak_boost,
            Outcome::Loss => -self.config.loss_streak_penalty,
            Outcome::Breakeven => 0.0,
        }
    }

    fn push(&mut self, symbol: Symbol, entry: ContextEntry) {
        let expiry = TimeDelta::seconds(self.config.expiry_secs);
        let now = entry.at;
        let entries = self.entries.entry(symbol).or_default();
        entries.push_back(entry);
        entries.retain(|entry| now - entry.at <= expiry);
        while entries.len() > self.config.max_entries {
            entries.pop_front();
        }
    }
}

/// Combo tags sharing at least half of the longer tag's indicators.
fn similar(a: &str, b: &str) -> bool {
    let a = a.split('+').collect::<Vec<_>>();
    let b = b.split('+').collect::<Vec<_>>();
    let shared = a.iter().filter(|tag| b.contains(tag)).count();
    shared > 0 && shared * 2 >= a.len().max(b.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::{
        TradeExit,
        tests::{context, time},
    };

    fn outcome(combo_tag: &str, pnl: f64, minute: u32) -> TradeMemory {
        TradeMemory::new(
            context("BTCUSDT", combo_tag),
            TradeExit {
                exit_price: 100.0,
                exit_time: time(12, minute),
                realised_pnl: pnl,
                realised_roe: pnl * 5.0,
                exit_reason: String::from("test"),
            },
        )
    }

    #[test]
    fn test_similar() {
        assert!(similar("macd_cross", "macd_cross"));
        assert!(similar("ema_stack+macd_cross", "macd_cross"));
        assert!(!similar("ema_stack+macd_cross+rsi_zone", "macd_cross"));
        assert!(!similar("bollinger", "macd_cross"));
    }

    #[test]
    fn test_boost() {
        struct TestCase {
            history: Vec<TradeMemory>,
            combo_tag: &'static str,
            expected: f64,
        }

        let cases = vec![
            // TC0: no context
            TestCase {
                history: vec![],
                combo_tag: "macd_cross",
                expected: 0.0,
            },
            // TC1: one similar winner
            TestCase {
                history: vec![outcome("macd_cross", 1.0, 0)],
                combo_tag: "macd_cross",
                expected: 3.0,
            },
            // TC2: winners capped at +6
            TestCase {
                history: vec![
                    outcome("macd_cross", 1.0, 0),
                    outcome("macd_cross", -1.0, 1),
                    outcome("macd_cross", 1.0, 2),
                    outcome("macd_cross", 1.0, 3),
                ],
                combo_tag: "macd_cross",
                // +6 winners, -4 loser
                expected: 2.0,
            },
            // TC3: three losses in a row, losers capped at -8, streak -5
            TestCase {
                history: vec![
                    outcome("macd_cross", -1.0, 0),
                    outcome("macd_cross", -1.0, 1),
                    outcome("macd_cross", -1.0, 2),
                ],
                combo_tag: "macd_cross",
                expected: -10.0,
            },
            // TC4: win streak on unrelated combos still counts
            TestCase {
                history: vec![
                    outcome("bollinger", 1.0, 0),
                    outcome("bollinger", 1.0, 1),
                    outcome("bollinger", 0.0, 2),
                    outcome("bollinger", 1.0, 3),
                ],
                combo_tag: "macd_cross",
                expected: 3.0,
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            let mut memory = ContextualMemory::default();
            test.history.iter().for_each(|trade| memory.record_trade(trade));
            let actual = memory.boost(
                &Symbol::from("BTCUSDT"),
                Side::Long,
                test.combo_tag,
                time(12, 30),
            );
            assert_eq!(actual, test.expected, "TC{index} failed");
        }
    }

    #[test]
    fn test_entries_expire_and_are_bounded() {
        let mut memory = ContextualMemory::default();
        let symbol = Symbol::from("BTCUSDT");
        memory.record_trade(&outcome("macd_cross", 1.0, 0));

        // An hour and a minute later the winner has expired
        assert_eq!(memory.boost(&symbol, Side::Long, "macd_cross", time(13, 1)), 0.0);

        for minute in 0..30 {
            memory.record_event(symbol.clone(), "funding spike", time(12, minute));
        }
        assert_eq!(memory.recent(&symbol, time(12, 30)).count(), 20);
    }

    #[test]
    fn test_opposite_side_is_not_similar() {
        let mut memory = ContextualMemory::default();
        memory.record_trade(&outcome("macd_cross", 1.0, 0));
        let actual = memory.boost(&Symbol::from("BTCUSDT"), Side::Short, "macd_cross", time(12, 5));
        assert_eq!(actual, 0.0);
    }
}
