#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    unused_crate_dependencies,
    unused_extern_crates,
    clippy::unused_self,
    clippy::useless_let_if_seq,
    missing_debug_implementations,
    rust_2018_idioms,
    rust_2024_compatibility
)]

//! # Scalper-Memory
//! Adaptive memory that learns from closed trades and feeds adjustments back into signal
//! generation.
//!
//! Six stores sit behind the [`MemorySystem`] façade:
//! * [`TradeHistory`]: capped ring of closed [`TradeMemory`] records.
//! * [`PatternLearner`]: win rates per indicator combo, confidence bucket, regime, hour, symbol
//!   and judge agreement.
//! * [`RegimeTracker`]: debounced per-symbol market [`Regime`] classification and per-regime
//!   multipliers.
//! * [`SymbolIntelligence`]: per-symbol priority and best / worst trading conditions.
//! * [`ContextualMemory`]: short-lived window of recent outcomes & events per symbol.
//! * [`Tuner`]s: tighten or relax entry gates from the smoothed win rate.
//!
//! Trade history, patterns, regimes and symbols are persisted as versioned JSON documents by a
//! [`JsonStore`].

use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use scalper_instrument::{Side, Symbol};
use scalper_ta::IndicatorSnapshot;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Tighten / relax tuners and memory adjusted [`Thresholds`].
pub mod adaptive;

/// Short-lived per-symbol context.
pub mod context;

/// Closed trade ring buffer.
pub mod history;

/// Pattern learning over closed trades.
pub mod pattern;

/// Versioned JSON persistence with atomic writes.
pub mod persist;

/// Market regime classification & tracking.
pub mod regime;

/// Per-symbol performance ranking.
pub mod symbol;

/// Closed trade records & running statistics.
pub mod trade;

pub use adaptive::{Thresholds, Tuner, TunerConfig};
pub use context::{ContextConfig, ContextualMemory};
pub use history::{TradeHistory, TradeStats};
pub use pattern::{PatternBoost, PatternConfig, PatternKey, PatternLearner, PatternQuery};
pub use persist::{JsonStore, PersistError};
pub use regime::{
    Regime, RegimeAdjustment, RegimeConfig, RegimeMultipliers, RegimeTracker, SymbolRegime,
};
pub use symbol::{SymbolConfig, SymbolIntelligence};
pub use trade::{Outcome, PatternStats, TradeContext, TradeExit, TradeMemory};

/// [`MemorySystem`] configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Apply memory adjustments to signal generation.
    pub enabled: bool,
    /// Persist stores under `base_path`.
    pub persist: bool,
    pub base_path: PathBuf,
    /// Closed trades between automatic saves.
    pub auto_save_every: u32,
    pub history_capacity: usize,
    pub pattern: PatternConfig,
    pub regime: RegimeConfig,
    pub symbol: SymbolConfig,
    pub context: ContextConfig,
    /// Tunes the confidence & score gates.
    pub thresholds: TunerConfig,
    /// Tunes the volume & trend gates.
    pub filter: TunerConfig,
    /// Trades entered below this volume ratio passed the volume gate marginally.
    pub marginal_volume_ratio: f64,
    /// Trades entered below this trend strength passed the trend gate marginally.
    pub marginal_trend_strength: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            persist: true,
            base_path: PathBuf::from("data/memory"),
            auto_save_every: 10,
            history_capacity: history::DEFAULT_HISTORY_CAPACITY,
            pattern: PatternConfig::default(),
            regime: RegimeConfig::default(),
            symbol: SymbolConfig::default(),
            context: ContextConfig::default(),
            thresholds: TunerConfig::default(),
            filter: TunerConfig::default(),
            marginal_volume_ratio: 1.2,
            marginal_trend_strength: 0.5,
        }
    }
}

/// Combined pattern & context adjustment for a candidate signal.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct MemoryBoost {
    pub pattern: PatternBoost,
    pub context: f64,
}

impl MemoryBoost {
    pub fn confidence(&self) -> f64 {
        self.pattern.confidence + self.context
    }

    pub fn score(&self) -> f64 {
        self.pattern.score
    }

    pub fn strongly_negative(&self) -> bool {
        self.pattern.strongly_negative
    }
}

#[derive(Debug, Deserialize, Serialize)]
struct TradeHistoryDocument {
    trades: Vec<TradeMemory>,
}

#[derive(Debug, Deserialize, Serialize)]
struct PatternsDocument {
    patterns: Vec<pattern::PatternEntry>,
}

#[derive(Debug, Deserialize, Serialize)]
struct SymbolsDocument {
    symbols: FnvHashMap<Symbol, symbol::SymbolProfile>,
}

/// Façade over the memory stores. All mutation goes through [`MemorySystem::record_trade`] and
/// [`MemorySystem::observe_regime`].
#[derive(Debug)]
pub struct MemorySystem {
    config: MemoryConfig,
    store: Option<JsonStore>,
    history: TradeHistory,
    patterns: PatternLearner,
    regimes: RegimeTracker,
    symbols: SymbolIntelligence,
    context: ContextualMemory,
    thresholds: Tuner,
    filter: Tuner,
    unsaved: u32,
}

impl MemorySystem {
    /// Empty memory, persisting to `config.base_path` if enabled.
    pub fn new(config: MemoryConfig) -> Self {
        let store = config
            .persist
            .then(|| JsonStore::new(config.base_path.clone()));

        Self {
            store,
            history: TradeHistory::new(config.history_capacity),
            patterns: PatternLearner::new(config.pattern),
            regimes: RegimeTracker::new(config.regime),
            symbols: SymbolIntelligence::new(config.symbol),
            context: ContextualMemory::new(config.context),
            thresholds: Tuner::new("thresholds", config.thresholds),
            filter: Tuner::new("filter", config.filter),
            unsaved: 0,
            config,
        }
    }

    /// Memory restored from `config.base_path`. Missing, stale or corrupt documents leave the
    /// corresponding store empty.
    pub fn load(config: MemoryConfig) -> Self {
        let mut memory = Self::new(config);
        let Some(store) = &memory.store else {
            return memory;
        };

        if let Some(document) = store.load::<TradeHistoryDocument>(persist::TRADE_HISTORY_FILE) {
            memory.history = TradeHistory::from_trades(memory.config.history_capacity, document.trades);
        }
        if let Some(document) = store.load::<PatternsDocument>(persist::PATTERNS_FILE) {
            memory.patterns = PatternLearner::from_entries(memory.config.pattern, document.patterns);
        }
        if let Some(state) = store.load(persist::REGIMES_FILE) {
            memory.regimes = RegimeTracker::from_state(memory.config.regime, state);
        }
        if let Some(document) = store.load::<SymbolsDocument>(persist::SYMBOLS_FILE) {
            memory.symbols = SymbolIntelligence::from_profiles(memory.config.symbol, document.symbols);
        }

        // Tuners re-learn from the restored history
        let recent = memory
            .history
            .iter()
            .cloned()
            .collect::<Vec<_>>();
        recent.iter().for_each(|trade| memory.tune(trade));

        info!(
            trades = memory.history.len(),
            patterns = memory.patterns.len(),
            symbols = memory.symbols.len(),
            regimes = memory.regimes.len(),
            "memory loaded"
        );
        memory
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn history(&self) -> &TradeHistory {
        &self.history
    }

    pub fn patterns(&self) -> &PatternLearner {
        &self.patterns
    }

    pub fn regimes(&self) -> &RegimeTracker {
        &self.regimes
    }

    pub fn symbols(&self) -> &SymbolIntelligence {
        &self.symbols
    }

    pub fn context(&self) -> &ContextualMemory {
        &self.context
    }

    pub fn stats(&self) -> TradeStats {
        self.history.stats()
    }

    /// Feed a fresh snapshot of `symbol` to the regime tracker and return the adjustment for
    /// that symbol's active regime.
    pub fn observe_regime(
        &mut self,
        symbol: &Symbol,
        snapshot: &IndicatorSnapshot,
        now: DateTime<Utc>,
    ) -> RegimeAdjustment {
        self.regimes.observe(symbol, snapshot, now);
        self.regimes.adjustment(symbol)
    }

    /// Entry gates tightened or relaxed by recent performance.
    pub fn adjust_thresholds(&self, base: Thresholds) -> Thresholds {
        base.adjusted(&self.thresholds, &self.filter)
    }

    /// Learned pattern & context adjustment for a candidate.
    pub fn boost(&self, query: &PatternQuery, side: Side, now: DateTime<Utc>) -> MemoryBoost {
        MemoryBoost {
            pattern: self.patterns.boost(query),
            context: self
                .context
                .boost(&query.symbol, side, &query.combo_tag, now),
        }
    }

    /// Confidence adjustment from the symbol's priority.
    pub fn symbol_boost(&self, symbol: &Symbol) -> f64 {
        self.symbols.boost(symbol)
    }

    pub fn symbol_priority(&self, symbol: &Symbol) -> f64 {
        self.symbols.priority(symbol)
    }

    pub fn rank_symbols<'a, Iter>(&self, symbols: Iter) -> Vec<(Symbol, f64)>
    where
        Iter: IntoIterator<Item = &'a Symbol>,
    {
        self.symbols.rank(symbols)
    }

    /// Learn from a closed trade, saving every `auto_save_every` trades.
    pub fn record_trade(&mut self, trade: TradeMemory) {
        info!(
            symbol = %trade.symbol(),
            side = %trade.entry.side,
            outcome = %trade.outcome,
            pnl = trade.pnl(),
            roe = trade.roe(),
            combo = %trade.entry.combo_tag,
            "recording closed trade"
        );

        self.patterns.record(&trade);
        if let Some(regime) = trade.entry.regime {
            self.regimes.record_outcome(regime, trade.outcome, trade.roe());
        }
        self.symbols.record(&trade);
        self.context.record_trade(&trade);
        self.tune(&trade);
        self.history.push(trade);

        self.unsaved += 1;
        if self.unsaved >= self.config.auto_save_every.max(1) {
            self.save();
        }
    }

    pub fn record_event(&mut self, symbol: Symbol, description: impl Into<String>, at: DateTime<Utc>) {
        self.context.record_event(symbol, description, at);
    }

    /// Persist every store. Failures are logged and otherwise ignored.
    pub fn save(&mut self) {
        self.unsaved = 0;
        let Some(store) = &self.store else {
            return;
        };

        let results = [
            store.save(
                persist::TRADE_HISTORY_FILE,
                &TradeHistoryDocument {
                    trades: self.history.to_vec(),
                },
            ),
            store.save(
                persist::PATTERNS_FILE,
                &PatternsDocument {
                    patterns: self.patterns.entries(),
                },
            ),
            store.save(persist::REGIMES_FILE, self.regimes.state()),
            store.save(
                persist::SYMBOLS_FILE,
                &SymbolsDocument {
                    symbols: self.symbols.profiles().clone(),
                },
            ),
        ];

        for error in results.into_iter().filter_map(Result::err) {
            warn!(%error, "failed to persist memory");
        }
    }

    /// Final save before the owning agent stops.
    pub fn shutdown(&mut self) {
        info!(trades = self.history.len(), "saving memory on shutdown");
        self.save();
    }

    fn tune(&mut self, trade: &TradeMemory) {
        self.thresholds.observe(trade.outcome);

        let marginal = trade.entry.entry_snapshot.is_some_and(|snapshot| {
            snapshot.volume_ratio < self.config.marginal_volume_ratio
                || snapshot.trend_strength < self.config.marginal_trend_strength
        });
        if marginal {
            self.filter.observe(trade.outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::tests::{context, time, trade};
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> MemoryConfig {
        MemoryConfig {
            base_path: dir.path().join("memory"),
            ..MemoryConfig::default()
        }
    }

    #[test]
    fn test_record_trade_updates_every_store() {
        let mut memory = MemorySystem::new(MemoryConfig {
            persist: false,
            ..MemoryConfig::default()
        });
        let symbol = Symbol::from("BTCUSDT");

        for _ in 0..5 {
            memory.record_trade(trade("BTCUSDT", "macd_cross", 2.0, 10.0));
        }

        assert_eq!(memory.history().len(), 5);
        assert!(memory.symbol_priority(&symbol) > 0.5);
        assert!(memory.symbol_boost(&symbol) > 0.0);

        let query = PatternQuery::from(&context("BTCUSDT", "macd_cross"));
        let boost = memory.boost(&query, Side::Long, time(10, 30));
        assert_eq!(boost.pattern.confidence, 10.0);
        // two similar winners count, capped at +6, on top of a win streak
        assert_eq!(boost.context, 9.0);
        assert_eq!(boost.confidence(), 19.0);
        assert!(!boost.strongly_negative());

        assert_eq!(
            memory
                .regimes()
                .adjustment_for(Regime::TrendingUp)
                .confidence_multiplier,
            1.2
        );
    }

    #[test]
    fn test_auto_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let mut memory = MemorySystem::new(config(&tmp));

        for index in 0..9 {
            let pnl = if index % 3 == 0 { -1.0 } else { 1.5 };
            memory.record_trade(trade("ETHUSDT", "ema_stack+macd_cross", pnl, pnl * 4.0));
        }
        assert!(!tmp.path().join("memory").join(persist::TRADE_HISTORY_FILE).exists());

        memory.record_trade(trade("ETHUSDT", "ema_stack+macd_cross", 1.5, 6.0));
        for file in [
            persist::TRADE_HISTORY_FILE,
            persist::PATTERNS_FILE,
            persist::REGIMES_FILE,
            persist::SYMBOLS_FILE,
        ] {
            assert!(tmp.path().join("memory").join(file).exists(), "{file} missing");
        }

        let restored = MemorySystem::load(config(&tmp));
        assert_eq!(restored.history().to_vec(), memory.history().to_vec());
        assert_eq!(restored.patterns().len(), memory.patterns().len());
        assert_eq!(restored.regimes().state(), memory.regimes().state());
        assert_eq!(restored.symbols().profiles(), memory.symbols().profiles());

        let query = PatternQuery::from(&context("ETHUSDT", "ema_stack+macd_cross"));
        assert_eq!(
            restored.patterns().boost(&query),
            memory.patterns().boost(&query)
        );
    }

    #[test]
    fn test_version_mismatch_loads_empty() {
        let tmp = TempDir::new().unwrap();
        let mut memory = MemorySystem::new(config(&tmp));
        memory.record_trade(trade("ETHUSDT", "macd_cross", 1.0, 5.0));
        memory.shutdown();

        let stale = JsonStore::with_version(tmp.path().join("memory"), persist::MEMORY_VERSION + 1);
        stale
            .save(
                persist::TRADE_HISTORY_FILE,
                &TradeHistoryDocument {
                    trades: memory.history().to_vec(),
                },
            )
            .unwrap();

        let restored = MemorySystem::load(config(&tmp));
        assert!(restored.history().is_empty());
        // Other documents are independently versioned
        assert_eq!(restored.symbols().len(), 1);
    }

    #[test]
    fn test_unwritable_base_path_keeps_learning() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("memory");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let mut memory = MemorySystem::new(config(&tmp));

        // Crosses the auto-save interval, every write fails
        for _ in 0..12 {
            memory.record_trade(trade("BTCUSDT", "macd_cross", 1.0, 5.0));
        }
        memory.save();
        memory.shutdown();

        assert_eq!(memory.history().len(), 12);
        assert_eq!(memory.stats().wins, 12);
        assert!(memory.symbol_priority(&Symbol::from("BTCUSDT")) > 0.5);
        assert_eq!(std::fs::read(&blocker).unwrap(), b"not a directory");

        let restored = MemorySystem::load(config(&tmp));
        assert!(restored.history().is_empty());
    }

    #[test]
    fn test_losing_streak_tightens_thresholds() {
        let mut memory = MemorySystem::new(MemoryConfig {
            persist: false,
            ..MemoryConfig::default()
        });
        let base = Thresholds {
            min_confidence: 60.0,
            min_score: 50.0,
            min_volume_ratio: 0.8,
            min_trend_strength: 0.3,
        };
        assert_eq!(memory.adjust_thresholds(base), base);

        for _ in 0..12 {
            memory.record_trade(trade("SOLUSDT", "bollinger", -1.0, -5.0));
        }

        let adjusted = memory.adjust_thresholds(base);
        assert!(adjusted.min_confidence > base.min_confidence);
        assert!(adjusted.min_score > base.min_score);
        // trades without an entry snapshot never retune the volume & trend filter
        assert_eq!(adjusted.min_volume_ratio, base.min_volume_ratio);
    }
}
