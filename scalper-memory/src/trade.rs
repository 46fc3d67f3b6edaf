use crate::regime::Regime;
use chrono::{DateTime, TimeDelta, Timelike, Utc};
use derive_more::Display;
use scalper_instrument::{Side, Symbol};
use scalper_ta::IndicatorSnapshot;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Realised pnl (USD) beyond which a closed trade counts as a [`Outcome::Win`] or
/// [`Outcome::Loss`].
pub const OUTCOME_THRESHOLD: f64 = 0.01;

/// Classification of a closed trade.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    #[display("win")]
    Win,
    #[display("loss")]
    Loss,
    #[display("breakeven")]
    Breakeven,
}

impl Outcome {
    /// Win if `pnl > 0.01`, loss if `pnl < -0.01`, otherwise breakeven.
    pub fn classify(pnl: f64) -> Self {
        if pnl > OUTCOME_THRESHOLD {
            Outcome::Win
        } else if pnl < -OUTCOME_THRESHOLD {
            Outcome::Loss
        } else {
            Outcome::Breakeven
        }
    }

    pub fn is_win(&self) -> bool {
        matches!(self, Outcome::Win)
    }
}

/// Everything known about a trade at entry, kept alongside the open position until it closes.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradeContext {
    pub symbol: Symbol,
    pub side: Side,
    pub entry_price: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub entry_time: DateTime<Utc>,
    pub leverage: f64,
    pub entry_snapshot: Option<IndicatorSnapshot>,
    pub entry_score: f64,
    pub confidence: f64,
    /// Indicator combination that produced the signal, eg/ "ema_stack+macd_cross".
    pub combo_tag: String,
    pub regime: Option<Regime>,
    /// `None` when the judge was not consulted or was unavailable.
    pub judge_agreed: Option<bool>,
}

impl TradeContext {
    /// UTC hour of the entry.
    pub fn hour(&self) -> u32 {
        self.entry_time.hour()
    }
}

/// How a trade was closed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradeExit {
    pub exit_price: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub exit_time: DateTime<Utc>,
    /// Total realised pnl (USD) including partial closes.
    pub realised_pnl: f64,
    /// Realised ROE (%) on the margin used.
    pub realised_roe: f64,
    pub exit_reason: String,
}

/// Immutable record of a closed position.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TradeMemory {
    pub id: Uuid,
    pub entry: TradeContext,
    pub exit: TradeExit,
    pub outcome: Outcome,
}

impl TradeMemory {
    pub fn new(entry: TradeContext, exit: TradeExit) -> Self {
        Self {
            id: Uuid::new_v4(),
            outcome: Outcome::classify(exit.realised_pnl),
            entry,
            exit,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.entry.symbol
    }

    pub fn pnl(&self) -> f64 {
        self.exit.realised_pnl
    }

    pub fn roe(&self) -> f64 {
        self.exit.realised_roe
    }

    pub fn hold_duration(&self) -> TimeDelta {
        self.exit.exit_time - self.entry.entry_time
    }
}

/// Running win / loss statistics for any memory bucket.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct PatternStats {
    pub wins: u32,
    pub losses: u32,
    pub win_rate: f64,
    pub avg_roe: f64,
    pub total_trades: u32,
}

impl PatternStats {
    /// Fold one closed trade into the running statistics.
    ///
    /// Breakeven trades count towards `total_trades` and the win rate denominator.
    pub fn record(&mut self, outcome: Outcome, roe: f64) {
        match outcome {
            Outcome::Win => self.wins += 1,
            Outcome::Loss => self.losses += 1,
            Outcome::Breakeven => {}
        }
        self.total_trades += 1;

        let total = f64::from(self.total_trades);
        self.win_rate = f64::from(self.wins) / total;
        self.avg_roe += (roe - self.avg_roe) / total;
    }
}
