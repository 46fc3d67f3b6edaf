use chrono::{DateTime, TimeDelta, Utc};
use fnv::FnvHashMap;
use scalper_instrument::Symbol;
use scalper_judge::{ExitRequest, JudgeClient, JudgeGateway};
use scalper_risk::{ExitReason, Position};
use scalper_ta::IndicatorSnapshot;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Opt-in judge exit check, independent of the numeric exit ladder.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct JudgeExitConfig {
    pub enabled: bool,
    /// Positions younger than this are never sent to the judge.
    pub min_hold_secs: i64,
    /// Minimum spacing between judge checks of the same position.
    pub check_interval_secs: i64,
    /// Judge confidence at or above which a recommended close is executed.
    pub min_confidence: f64,
}

impl Default for JudgeExitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_hold_secs: 120,
            check_interval_secs: 60,
            min_confidence: 80.0,
        }
    }
}

/// Asks the judge whether open positions should be closed early.
#[derive(Debug, Default)]
pub struct JudgeExitEvaluator {
    config: JudgeExitConfig,
    last_checked: FnvHashMap<Symbol, DateTime<Utc>>,
}

impl JudgeExitEvaluator {
    pub fn new(config: JudgeExitConfig) -> Self {
        Self {
            config,
            last_checked: FnvHashMap::default(),
        }
    }

    pub fn config(&self) -> &JudgeExitConfig {
        &self.config
    }

    /// Whether `position` should be sent to the judge at `now`.
    pub fn is_due(&self, position: &Position, now: DateTime<Utc>) -> bool {
        if !self.config.enabled || position.held(now) < TimeDelta::seconds(self.config.min_hold_secs) {
            return false;
        }
        self.last_checked
            .get(&position.symbol)
            .is_none_or(|last| now - *last >= TimeDelta::seconds(self.config.check_interval_secs))
    }

    /// Consult the judge if due, returning [`ExitReason::JudgeExit`] when it confidently
    /// recommends closing. Degraded verdicts never close a position.
    pub async fn evaluate<Client>(
        &mut self,
        judge: &JudgeGateway<Client>,
        position: &Position,
        snapshot: Option<IndicatorSnapshot>,
        now: DateTime<Utc>,
    ) -> Option<ExitReason>
    where
        Client: JudgeClient,
    {
        if !self.is_due(position, now) {
            return None;
        }
        self.last_checked.insert(position.symbol.clone(), now);

        let verdict = judge
            .confirm_exit(&ExitRequest {
                symbol: position.symbol.clone(),
                side: position.side,
                entry_price: position.entry_price,
                current_price: position.current_price,
                roe: position.unrealised_roe,
                highest_roe: position.highest_roe,
                held_minutes: position.held(now).num_seconds() as f64 / 60.0,
                snapshot,
            })
            .await;

        let close = verdict.agrees && !verdict.degraded && verdict.confidence >= self.config.min_confidence;
        if close {
            info!(
                symbol = %position.symbol,
                confidence = verdict.confidence,
                reason = %verdict.reason,
                "judge recommends exit"
            );
        }
        close.then_some(ExitReason::JudgeExit)
    }

    /// Forget a closed position.
    pub fn remove(&mut self, symbol: &Symbol) {
        self.last_checked.remove(symbol);
    }
}
