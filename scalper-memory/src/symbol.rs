use crate::trade::{PatternStats, TradeMemory};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use itertools::Itertools;
use scalper_instrument::Symbol;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

/// Tunables of [`SymbolIntelligence`].
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SymbolConfig {
    pub max_symbols: usize,
    /// Maximum best & worst condition tags kept per symbol.
    pub max_tags: usize,
    /// Trades on a condition before it can be ranked best / worst.
    pub min_condition_trades: u32,
    /// Trades after which a symbol's own statistics are fully trusted.
    pub full_weight_trades: u32,
    /// Confidence points per unit of priority away from neutral.
    pub boost_scale: f64,
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            max_symbols: 200,
            max_tags: 5,
            min_condition_trades: 2,
            full_weight_trades: 20,
            boost_scale: 10.0,
        }
    }
}

/// What has been learned about trading one symbol.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolProfile {
    pub stats: PatternStats,
    pub total_pnl: f64,
    pub conditions: FnvHashMap<String, PatternStats>,
    pub best_conditions: Vec<String>,
    pub worst_conditions: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub last_trade: Option<DateTime<Utc>>,
}

impl SymbolProfile {
    fn record(&mut self, trade: &TradeMemory, config: &SymbolConfig) {
        self.stats.record(trade.outcome, trade.roe());
        self.total_pnl += trade.pnl();
        self.last_trade = Some(trade.exit.exit_time);

        for tag in condition_tags(trade) {
            self.conditions
                .entry(tag)
                .or_default()
                .record(trade.outcome, trade.roe());
        }

        let ranked = self
            .conditions
            .iter()
            .filter(|(_, stats)| stats.total_trades >= config.min_condition_trades)
            .sorted_by(|(a_tag, a), (b_tag, b)| {
                b.win_rate
                    .partial_cmp(&a.win_rate)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a_tag.cmp(b_tag))
            })
            .collect::<Vec<_>>();

        self.best_conditions = ranked
            .iter()
            .filter(|(_, stats)| stats.win_rate >= 0.5)
            .take(config.max_tags)
            .map(|(tag, _)| (*tag).clone())
            .collect();
        self.worst_conditions = ranked
            .iter()
            .rev()
            .filter(|(_, stats)| stats.win_rate < 0.5)
            .take(config.max_tags)
            .map(|(tag, _)| (*tag).clone())
            .collect();
    }

    /// Priority in [0, 1], shrunk towards 0.5 until `full_weight_trades` have been observed.
    pub fn priority(&self, config: &SymbolConfig) -> f64 {
        let weight =
            (f64::from(self.stats.total_trades) / f64::from(config.full_weight_trades.max(1))).min(1.0);
        let roe_score = (0.5 + self.stats.avg_roe / 10.0).clamp(0.0, 1.0);
        let raw = 0.6 * self.stats.win_rate + 0.4 * roe_score;
        (0.5 + (raw - 0.5) * weight).clamp(0.0, 1.0)
    }
}

/// Conditions a trade was taken under: each indicator in its combo, its regime and entry hour.
fn condition_tags(trade: &TradeMemory) -> Vec<String> {
    trade
        .entry
        .combo_tag
        .split('+')
        .filter(|tag| !tag.is_empty() && *tag != "none")
        .map(str::to_owned)
        .chain(trade.entry.regime.map(|regime| format!("regime:{regime}")))
        .chain(std::iter::once(format!("hour:{}", trade.entry.hour())))
        .collect()
}

/// Per-symbol performance ranking.
#[derive(Debug, Clone, Default)]
pub struct SymbolIntelligence {
    config: SymbolConfig,
    profiles: FnvHashMap<Symbol, SymbolProfile>,
}

impl SymbolIntelligence {
    pub fn new(config: SymbolConfig) -> Self {
        Self::from_profiles(config, FnvHashMap::default())
    }

    pub fn from_profiles(config: SymbolConfig, profiles: FnvHashMap<Symbol, SymbolProfile>) -> Self {
        let mut intelligence = Self { config, profiles };
        intelligence.evict(None);
        intelligence
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn profile(&self, symbol: &Symbol) -> Option<&SymbolProfile> {
        self.profiles.get(symbol)
    }

    pub fn profiles(&self) -> &FnvHashMap<Symbol, SymbolProfile> {
        &self.profiles
    }

    pub fn record(&mut self, trade: &TradeMemory) {
        self.profiles
            .entry(trade.symbol().clone())
            .or_default()
            .record(trade, &self.config);
        self.evict(Some(trade.symbol()));
    }

    /// Priority in [0, 1]; 0.5 for a symbol never traded.
    pub fn priority(&self, symbol: &Symbol) -> f64 {
        self.profiles
            .get(symbol)
            .map_or(0.5, |profile| profile.priority(&self.config))
    }

    /// Confidence adjustment `(priority - 0.5) * boost_scale`.
    pub fn boost(&self, symbol: &Symbol) -> f64 {
        (self.priority(symbol) - 0.5) * self.config.boost_scale
    }

    /// `symbols` ordered by descending priority.
    pub fn rank<'a, Iter>(&self, symbols: Iter) -> Vec<(Symbol, f64)>
    where
        Iter: IntoIterator<Item = &'a Symbol>,
    {
        symbols
            .into_iter()
            .map(|symbol| (symbol.clone(), self.priority(symbol)))
            .sorted_by(|(a_symbol, a), (b_symbol, b)| {
                b.partial_cmp(a)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a_symbol.cmp(b_symbol))
            })
            .collect()
    }

    /// Evict the least traded profiles, never the `protected` symbol just recorded.
    fn evict(&mut self, protected: Option<&Symbol>) {
        while self.profiles.len() > self.config.max_symbols {
            let Some(symbol) = self
                .profiles
                .iter()
                .filter(|(symbol, _)| Some(*symbol) != protected)
                .min_by_key(|(_, profile)| profile.stats.total_trades)
                .map(|(symbol, _)| symbol.clone())
            else {
                break;
            };
            debug!(%symbol, "evicting least traded symbol profile");
            self.profiles.remove(&symbol);
        }
    }
}
