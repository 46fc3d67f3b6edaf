use crate::trade::{Outcome, TradeMemory};
use scalper_instrument::Symbol;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use uuid::Uuid;

/// Default maximum number of closed trades kept in memory.
pub const DEFAULT_HISTORY_CAPACITY: usize = 1_000;

/// Aggregate statistics over a set of closed trades.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct TradeStats {
    pub total: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakevens: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_roe: f64,
}

impl<'a> FromIterator<&'a TradeMemory> for TradeStats {
    fn from_iter<Iter: IntoIterator<Item = &'a TradeMemory>>(iter: Iter) -> Self {
        let mut stats = iter
            .into_iter()
            .fold(TradeStats::default(), |mut stats, trade| {
                stats.total += 1;
                match trade.outcome {
                    Outcome::Win => stats.wins += 1,
                    Outcome::Loss => stats.losses += 1,
                    Outcome::Breakeven => stats.breakevens += 1,
                }
                stats.total_pnl += trade.pnl();
                stats.avg_roe += trade.roe();
                stats
            });

        if stats.total > 0 {
            stats.win_rate = stats.wins as f64 / stats.total as f64;
            stats.avg_roe /= stats.total as f64;
        }
        stats
    }
}

/// Append-only ring of closed trades, pruned oldest-first past its capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeHistory {
    capacity: usize,
    trades: VecDeque<TradeMemory>,
}

impl Default for TradeHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

impl TradeHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            trades: VecDeque::new(),
        }
    }

    /// Rebuild a history from persisted trades, keeping the newest `capacity` of them.
    pub fn from_trades(capacity: usize, trades: Vec<TradeMemory>) -> Self {
        let mut history = Self::new(capacity);
        trades.into_iter().for_each(|trade| history.push(trade));
        history
    }

    pub fn push(&mut self, trade: TradeMemory) {
        self.trades.push_back(trade);
        while self.trades.len() > self.capacity {
            self.trades.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, id: &Uuid) -> Option<&TradeMemory> {
        self.trades.iter().find(|trade| &trade.id == id)
    }

    /// Trades oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &TradeMemory> {
        self.trades.iter()
    }

    /// Trades on `symbol`, oldest to newest.
    pub fn by_symbol<'a>(&'a self, symbol: &'a Symbol) -> impl Iterator<Item = &'a TradeMemory> {
        self.trades.iter().filter(move |trade| trade.symbol() == symbol)
    }

    /// Up to `count` most recent trades, newest first.
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &TradeMemory> {
        self.trades.iter().rev().take(count)
    }

    pub fn stats(&self) -> TradeStats {
        self.trades.iter().collect()
    }

    pub fn to_vec(&self) -> Vec<TradeMemory> {
        self.trades.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::tests::trade;

    #[test]
    fn test_history_prunes_oldest_first() {
        let mut history = TradeHistory::new(3);
        let trades = (0..5)
            .map(|i| trade("BTCUSDT", "macd_cross", f64::from(i), 1.0))
            .collect::<Vec<_>>();
        let ids = trades.iter().map(|trade| trade.id).collect::<Vec<_>>();

        trades.into_iter().for_each(|trade| history.push(trade));

        assert_eq!(history.len(), 3);
        assert!(history.get(&ids[0]).is_none());
        assert!(history.get(&ids[1]).is_none());
        assert!(history.get(&ids[4]).is_some());

        let newest = history.recent(2).map(|trade| trade.id).collect::<Vec<_>>();
        assert_eq!(newest, vec![ids[4], ids[3]]);
    }

    #[test]
    fn test_history_indexes_and_stats() {
        let history = TradeHistory::from_trades(
            10,
            vec![
                trade("BTCUSDT", "macd_cross", 2.0, 10.0),
                trade("ETHUSDT", "macd_cross", -1.0, -5.0),
                trade("BTCUSDT", "rsi_extreme", 0.0, 0.0),
                trade("BTCUSDT", "rsi_extreme", 1.0, 3.0),
            ],
        );

        let btc = Symbol::from("BTCUSDT");
        assert_eq!(history.by_symbol(&btc).count(), 3);

        let stats = history.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.wins, 2);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.breakevens, 1);
        assert_eq!(stats.win_rate, 0.5);
        assert_eq!(stats.total_pnl, 2.0);
        assert_eq!(stats.avg_roe, 2.0);
    }

    #[test]
    fn test_empty_stats() {
        assert_eq!(TradeHistory::default().stats(), TradeStats::default());
    }
}
