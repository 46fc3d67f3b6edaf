use crate::{
    regime::Regime,
    trade::{PatternStats, TradeContext, TradeMemory},
};
use derive_more::Display;
use fnv::FnvHashMap;
use scalper_instrument::Symbol;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Tunables of the [`PatternLearner`].
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PatternConfig {
    /// Buckets with fewer trades contribute nothing.
    pub min_samples: u32,
    /// Maximum number of buckets before the least sampled are evicted.
    pub max_entries: usize,
    pub confidence_scale: f64,
    pub score_scale: f64,
    pub max_confidence_boost: f64,
    pub max_score_boost: f64,
    /// Combo bucket win rate below which a heavily penalised candidate is hard rejected.
    pub strongly_negative_win_rate: f64,
    /// Confidence boost at or below which a candidate is considered strongly negative.
    pub strongly_negative_boost: f64,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            min_samples: 5,
            max_entries: 500,
            confidence_scale: 20.0,
            score_scale: 30.0,
            max_confidence_boost: 10.0,
            max_score_boost: 15.0,
            strongly_negative_win_rate: 0.3,
            strongly_negative_boost: -8.0,
        }
    }
}

/// Dimension a closed trade is bucketed by.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PatternKey {
    #[display("combo:{_0}")]
    Combo(String),
    /// Lower bound of a confidence bucket of width 10.
    #[display("confidence:{_0}")]
    ConfidenceBucket(u8),
    #[display("regime:{_0}")]
    Regime(Regime),
    /// UTC hour of entry.
    #[display("hour:{_0}")]
    Hour(u32),
    #[display("symbol:{_0}")]
    Symbol(Symbol),
    #[display("judge_agreed:{_0}")]
    JudgeAgreement(bool),
}

impl PatternKey {
    pub fn confidence_bucket(confidence: f64) -> Self {
        let bucket = (confidence.clamp(0.0, 100.0) / 10.0).floor() * 10.0;
        PatternKey::ConfidenceBucket(bucket as u8)
    }
}

/// Candidate trade to look up in the [`PatternLearner`].
#[derive(Debug, Clone, PartialEq)]
pub struct PatternQuery {
    pub combo_tag: String,
    pub confidence: f64,
    pub regime: Option<Regime>,
    pub hour: u32,
    pub symbol: Symbol,
    pub judge_agreed: Option<bool>,
}

impl PatternQuery {
    pub fn keys(&self) -> Vec<PatternKey> {
        let mut keys = vec![
            PatternKey::Combo(self.combo_tag.clone()),
            PatternKey::confidence_bucket(self.confidence),
            PatternKey::Hour(self.hour),
            PatternKey::Symbol(self.symbol.clone()),
        ];
        keys.extend(self.regime.map(PatternKey::Regime));
        keys.extend(self.judge_agreed.map(PatternKey::JudgeAgreement));
        keys
    }
}

impl From<&TradeContext> for PatternQuery {
    fn from(value: &TradeContext) -> Self {
        Self {
            combo_tag: value.combo_tag.clone(),
            confidence: value.confidence,
            regime: value.regime,
            hour: value.hour(),
            symbol: value.symbol.clone(),
            judge_agreed: value.judge_agreed,
        }
    }
}

/// Learned adjustment for a candidate trade.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct PatternBoost {
    /// Confidence adjustment, clamped to `±max_confidence_boost`.
    pub confidence: f64,
    /// Score adjustment, clamped to `±max_score_boost`.
    pub score: f64,
    /// Number of sufficiently sampled buckets that contributed.
    pub matched: usize,
    /// The candidate matches a losing combination badly enough to be rejected outright.
    pub strongly_negative: bool,
}

/// Persisted form of one bucket.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PatternEntry {
    pub key: PatternKey,
    pub stats: PatternStats,
}

/// Learns win rates per [`PatternKey`] bucket from closed trades.
#[derive(Debug, Clone, Default)]
pub struct PatternLearner {
    config: PatternConfig,
    table: FnvHashMap<PatternKey, PatternStats>,
}

impl PatternLearner {
    pub fn new(config: PatternConfig) -> Self {
        Self {
            config,
            table: FnvHashMap::default(),
        }
    }

    pub fn from_entries(config: PatternConfig, entries: Vec<PatternEntry>) -> Self {
        let mut learner = Self::new(config);
        learner.table = entries
            .into_iter()
            .map(|entry| (entry.key, entry.stats))
            .collect();
        learner.evict(&[]);
        learner
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn stats(&self, key: &PatternKey) -> Option<&PatternStats> {
        self.table.get(key)
    }

    pub fn record(&mut self, trade: &TradeMemory) {
        let keys = PatternQuery::from(&trade.entry).keys();
        for key in &keys {
            self.table
                .entry(key.clone())
                .or_default()
                .record(trade.outcome, trade.roe());
        }
        self.evict(&keys);
    }

    /// Sum the contributions of every sufficiently sampled bucket matching the query.
    pub fn boost(&self, query: &PatternQuery) -> PatternBoost {
        let (sum, matched) = query
            .keys()
            .iter()
            .filter_map(|key| self.sampled(key))
            .fold((0.0, 0), |(sum, matched), stats| {
                (sum + contribution(stats), matched + 1)
            });

        let confidence = (sum * self.config.confidence_scale).clamp(
            -self.config.max_confidence_boost,
            self.config.max_confidence_boost,
        );
        let score = (sum * self.config.score_scale)
            .clamp(-self.config.max_score_boost, self.config.max_score_boost);

        let strongly_negative = confidence <= self.config.strongly_negative_boost
            && self
                .sampled(&PatternKey::Combo(query.combo_tag.clone()))
                .is_some_and(|stats| stats.win_rate < self.config.strongly_negative_win_rate);

        PatternBoost {
            confidence,
            score,
            matched,
            strongly_negative,
        }
    }

    pub fn entries(&self) -> Vec<PatternEntry> {
        self.table
            .iter()
            .map(|(key, stats)| PatternEntry {
                key: key.clone(),
                stats: *stats,
            })
            .collect()
    }

    fn sampled(&self, key: &PatternKey) -> Option<&PatternStats> {
        self.table
            .get(key)
            .filter(|stats| stats.total_trades >= self.config.min_samples)
    }

    /// Evict the least sampled buckets, never one of the `protected` keys just recorded.
    fn evict(&mut self, protected: &[PatternKey]) {
        while self.table.len() > self.config.max_entries {
            let Some(key) = self
                .table
                .iter()
                .filter(|(key, _)| !protected.contains(*key))
                .min_by_key(|(_, stats)| stats.total_trades)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            debug!(%key, "evicting least sampled pattern bucket");
            self.table.remove(&key);
        }
    }
}

/// `(win_rate - 0.5)` scaled by how large the bucket's average ROE is.
fn contribution(stats: &PatternStats) -> f64 {
    let roe_multiplier = (1.0 + stats.avg_roe / 5.0).clamp(0.5, 2.0);
    (stats.win_rate - 0.5) * roe_multiplier
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trade::tests::trade;

    fn query(combo_tag: &str) -> PatternQuery {
        PatternQuery::from(&trade("BTCUSDT", combo_tag, 0.0, 0.0).entry)
    }

    #[test]
    fn test_confidence_bucket() {
        struct TestCase {
            confidence: f64,
            expected: u8,
        }

        let cases = vec![
            // TC0
            TestCase {
                confidence: 72.0,
                expected: 70,
            },
            // TC1: bucket lower bound inclusive
            TestCase {
                confidence: 60.0,
                expected: 60,
            },
            // TC2: out of range clamps
            TestCase {
                confidence: 140.0,
                expected: 100,
            },
            // TC3
            TestCase {
                confidence: -5.0,
                expected: 0,
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            assert_eq!(
                PatternKey::confidence_bucket(test.confidence),
                PatternKey::ConfidenceBucket(test.expected),
                "TC{index} failed"
            );
        }
    }

    #[test]
    fn test_under_sampled_buckets_contribute_nothing() {
        let mut learner = PatternLearner::new(PatternConfig::default());
        for _ in 0..4 {
            learner.record(&trade("BTCUSDT", "macd_cross", 5.0, 20.0));
        }

        let boost = learner.boost(&query("macd_cross"));
        assert_eq!(boost, PatternBoost::default());
    }

    #[test]
    fn test_boost_is_clamped() {
        let mut learner = PatternLearner::new(PatternConfig::default());
        for _ in 0..5 {
            learner.record(&trade("BTCUSDT", "macd_cross", 5.0, 20.0));
        }

        // 6 buckets, each (1.0 - 0.5) * 2.0 = 1.0
        let boost = learner.boost(&query("macd_cross"));
        assert_eq!(boost.matched, 6);
        assert_eq!(boost.confidence, 10.0);
        assert_eq!(boost.score, 15.0);
        assert!(!boost.strongly_negative);
    }

    #[test]
    fn test_strongly_negative_combo() {
        let mut learner = PatternLearner::new(PatternConfig::default());
        for _ in 0..6 {
            learner.record(&trade("BTCUSDT", "rsi_extreme", -3.0, -10.0));
        }

        let boost = learner.boost(&query("rsi_extreme"));
        assert_eq!(boost.confidence, -10.0);
        assert_eq!(boost.score, -15.0);
        assert!(boost.strongly_negative);

        // Shared buckets are penalised but an unseen combo is not rejected outright
        let other = learner.boost(&query("bollinger"));
        assert!(other.confidence < 0.0);
        assert!(!other.strongly_negative);
    }

    #[test]
    fn test_single_bucket_contribution() {
        let mut learner = PatternLearner::new(PatternConfig::default());
        learner.table.insert(
            PatternKey::Combo(String::from("macd_cross")),
            PatternStats {
                wins: 6,
                losses: 4,
                win_rate: 0.6,
                avg_roe: 0.0,
                total_trades: 10,
            },
        );

        // (0.6 - 0.5) * 1.0 => confidence 2.0, score 3.0
        let boost = learner.boost(&query("macd_cross"));
        assert_eq!(boost.matched, 1);
        assert!((boost.confidence - 2.0).abs() < 1e-9);
        assert!((boost.score - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_eviction_removes_least_sampled() {
        let config = PatternConfig {
            max_entries: 8,
            ..PatternConfig::default()
        };
        let mut learner = PatternLearner::new(config);
        for _ in 0..3 {
            learner.record(&trade("BTCUSDT", "macd_cross", 1.0, 1.0));
        }
        // 6 shared buckets plus a new combo & symbol bucket
        learner.record(&trade("ETHUSDT", "bollinger", 1.0, 1.0));
        assert_eq!(learner.len(), 8);

        learner.record(&trade("SOLUSDT", "stochastic", 1.0, 1.0));
        assert_eq!(learner.len(), 8);
        assert_eq!(
            learner
                .stats(&PatternKey::Combo(String::from("macd_cross")))
                .map(|stats| stats.total_trades),
            Some(3)
        );
        assert!(learner.stats(&PatternKey::Combo(String::from("bollinger"))).is_none());
        assert!(learner.stats(&PatternKey::Symbol(Symbol::from("ETHUSDT"))).is_none());
        assert!(learner.stats(&PatternKey::Combo(String::from("stochastic"))).is_some());
    }
}
