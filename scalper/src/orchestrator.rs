use chrono::{DateTime, TimeDelta, Timelike, Utc};
use scalper_instrument::{Candle, Side, Symbol};
use scalper_judge::{EntryRequest, JudgeAction, JudgeClient, JudgeGateway};
use scalper_memory::{MemoryBoost, MemorySystem, PatternQuery, Regime, RegimeMultipliers, Thresholds};
use scalper_strategy::{
    Direction, StrategyConfig, check_counter_trend, check_rsi, score, validate,
};
use scalper_ta::{
    IndicatorConfig, IndicatorSnapshot, compute,
    levels::{SupportResistance, support_resistance},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

/// Signal orchestration thresholds not owned by the scorer or validator.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// UTC hours during which no entries are considered.
    pub blocked_hours: Vec<u32>,
    /// Minimum final confidence, before memory adjustment.
    pub min_confidence: f64,
    /// Confidence added when the judge agrees.
    pub judge_agree_bonus: f64,
    /// Confidence removed when the judge disagrees and agreement is not required.
    pub judge_disagree_penalty: f64,
    pub signal_ttl_secs: i64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            blocked_hours: Vec::new(),
            min_confidence: 60.0,
            judge_agree_bonus: 5.0,
            judge_disagree_penalty: 10.0,
            signal_ttl_secs: 60,
        }
    }
}

/// Accepted entry signal. Read-only once created.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Signal {
    pub id: Uuid,
    pub symbol: Symbol,
    pub side: Side,
    /// Final confidence [0, 100], after judge, memory & symbol adjustments.
    pub confidence: f64,
    pub score: f64,
    pub reasons: Vec<String>,
    pub combo_tag: String,
    pub indicators: IndicatorSnapshot,
    pub regime: Regime,
    pub multipliers: RegimeMultipliers,
    /// `None` when the judge was not consulted or could not be reached.
    pub judge_agreed: Option<bool>,
    pub support_resistance: Option<SupportResistance>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl Signal {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Stage at which a candidate was rejected. Each stage short-circuits the rest.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub enum Rejection {
    OutsideTradingHours { hour: u32 },
    InsufficientData { candles: usize, required: usize },
    NoDirection { direction: Direction, long_score: f64, short_score: f64 },
    /// Counter-trend or RSI hard gate.
    HardGate(scalper_strategy::Rejection),
    Validation(Vec<scalper_strategy::Rejection>),
    JudgeDisagreed { action: JudgeAction, confidence: f64, reason: String },
    StronglyNegativePattern { combo_tag: String, boost: f64 },
    ConfidenceTooLow { confidence: f64, minimum: f64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::OutsideTradingHours { hour } => write!(f, "hour {hour} UTC is blocked"),
            Rejection::InsufficientData { candles, required } => {
                write!(f, "{candles} candles, {required} required")
            }
            Rejection::NoDirection {
                direction,
                long_score,
                short_score,
            } => write!(f, "{direction} (long {long_score:.1}, short {short_score:.1})"),
            Rejection::HardGate(rejection) => write!(f, "{rejection}"),
            Rejection::Validation(rejections) => {
                write!(f, "validation failed: ")?;
                for (index, rejection) in rejections.iter().enumerate() {
                    if index > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{rejection}")?;
                }
                Ok(())
            }
            Rejection::JudgeDisagreed {
                action,
                confidence,
                reason,
            } => write!(f, "judge says {action} ({confidence:.0}): {reason}"),
            Rejection::StronglyNegativePattern { combo_tag, boost } => {
                write!(f, "{combo_tag} has a strongly negative history ({boost:+.1})")
            }
            Rejection::ConfidenceTooLow {
                confidence,
                minimum,
            } => write!(f, "confidence {confidence:.1} below minimum {minimum:.1}"),
        }
    }
}

/// Composes indicators, scoring, validation, the judge and memory into accept / reject
/// decisions for one symbol at a time.
#[derive(Debug)]
pub struct Orchestrator<Client> {
    config: OrchestratorConfig,
    indicators: IndicatorConfig,
    strategy: StrategyConfig,
    judge: Option<JudgeGateway<Client>>,
}

impl<Client> Orchestrator<Client>
where
    Client: JudgeClient,
{
    pub fn new(
        config: OrchestratorConfig,
        indicators: IndicatorConfig,
        strategy: StrategyConfig,
        judge: Option<JudgeGateway<Client>>,
    ) -> Self {
        Self {
            config,
            indicators,
            strategy,
            judge,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn indicators(&self) -> &IndicatorConfig {
        &self.indicators
    }

    /// Judge gateway, if one is configured and enabled.
    pub fn judge(&self) -> Option<&JudgeGateway<Client>> {
        self.judge
            .as_ref()
            .filter(|gateway| gateway.config().enabled)
    }

    /// Entry gates before memory adjustment.
    pub fn base_thresholds(&self) -> Thresholds {
        Thresholds {
            min_confidence: self.config.min_confidence,
            min_score: self.strategy.validation.min_score,
            min_volume_ratio: self.strategy.validation.min_volume_ratio,
            min_trend_strength: self.strategy.scoring.min_trend_strength,
        }
    }

    /// Evaluate the latest candle of `symbol`.
    pub async fn evaluate(
        &self,
        memory: &mut MemorySystem,
        symbol: &Symbol,
        candles: &[Candle],
        now: DateTime<Utc>,
    ) -> Result<Signal, Rejection> {
        let hour = now.hour();
        if self.config.blocked_hours.contains(&hour) {
            return Err(Rejection::OutsideTradingHours { hour });
        }

        let snapshot =
            compute(candles, &self.indicators).ok_or(Rejection::InsufficientData {
                candles: candles.len(),
                required: self.indicators.min_candles(),
            })?;

        // Memory adjusted configuration
        let learning = memory.config().enabled;
        let mut adjustment = memory.observe_regime(symbol, &snapshot, now);
        let thresholds = if learning {
            memory.adjust_thresholds(self.base_thresholds())
        } else {
            adjustment.confidence_multiplier = 1.0;
            self.base_thresholds()
        };
        let mut strategy = self.strategy;
        strategy.validation.min_score = thresholds.min_score;
        strategy.validation.min_volume_ratio = thresholds.min_volume_ratio;
        strategy.scoring.min_trend_strength = thresholds.min_trend_strength;

        let scored = score(&snapshot, candles, &strategy.scoring);
        let Some(side) = scored.direction.side() else {
            return Err(Rejection::NoDirection {
                direction: scored.direction,
                long_score: scored.long_score,
                short_score: scored.short_score,
            });
        };

        if let Some(rejection) = check_counter_trend(&scored, &snapshot, &strategy.validation)
            .or_else(|| check_rsi(scored.direction, &snapshot, &strategy.validation))
        {
            return Err(Rejection::HardGate(rejection));
        }

        let validation = validate(&scored, &snapshot, &strategy.validation);
        if !validation.is_valid() {
            return Err(Rejection::Validation(validation.rejections));
        }

        let combo_tag = scored.combo_tag();
        let mut confidence = scored.confidence;
        let mut total_score = scored.total_score;
        let mut reasons = scored.reasons.clone();
        reasons.extend(
            validation
                .warnings
                .iter()
                .map(|warning| format!("warning:{warning}")),
        );

        // Judge confirmation
        let mut judge_agreed = None;
        if let Some(judge) = self.judge() {
            let verdict = judge
                .confirm_entry(&EntryRequest {
                    symbol: symbol.clone(),
                    side,
                    confidence,
                    score: total_score,
                    reasons: scored.reasons.clone(),
                    regime: Some(adjustment.regime.to_string()),
                    snapshot,
                })
                .await;

            if verdict.agrees {
                confidence += self.config.judge_agree_bonus;
            } else if judge.config().require_agreement {
                return Err(Rejection::JudgeDisagreed {
                    action: verdict.action,
                    confidence: verdict.confidence,
                    reason: verdict.reason,
                });
            } else {
                confidence -= self.config.judge_disagree_penalty;
            }
            reasons.push(format!("judge:{} {:.0} {}", verdict.action, verdict.confidence, verdict.reason));
            judge_agreed = (!verdict.degraded).then_some(verdict.agrees);
        }

        // Learned pattern & context boost
        let query = PatternQuery {
            combo_tag: combo_tag.clone(),
            confidence,
            regime: Some(adjustment.regime),
            hour,
            symbol: symbol.clone(),
            judge_agreed,
        };
        let boost = if learning {
            memory.boost(&query, side, now)
        } else {
            MemoryBoost::default()
        };
        if boost.strongly_negative() {
            return Err(Rejection::StronglyNegativePattern {
                combo_tag,
                boost: boost.confidence(),
            });
        }
        confidence += boost.confidence();
        total_score += boost.score();
        if boost.confidence() != 0.0 {
            reasons.push(format!("memory:boost {:+.1}", boost.confidence()));
        }

        confidence = (confidence * adjustment.confidence_multiplier).clamp(0.0, 100.0);
        if confidence < thresholds.min_confidence {
            return Err(Rejection::ConfidenceTooLow {
                confidence,
                minimum: thresholds.min_confidence,
            });
        }

        let symbol_boost = if learning { memory.symbol_boost(symbol) } else { 0.0 };
        if symbol_boost != 0.0 {
            reasons.push(format!("memory:symbol {symbol_boost:+.1}"));
        }
        confidence = (confidence + symbol_boost).clamp(0.0, 100.0);

        let signal = Signal {
            id: Uuid::new_v4(),
            symbol: symbol.clone(),
            side,
            confidence,
            score: total_score,
            reasons,
            combo_tag,
            indicators: snapshot,
            regime: adjustment.regime,
            multipliers: adjustment.multipliers,
            judge_agreed,
            support_resistance: support_resistance(
                candles,
                self.indicators.levels_lookback,
                self.indicators.swing_strength,
            ),
            timestamp: now,
            expires_at: now + TimeDelta::seconds(self.config.signal_ttl_secs),
        };

        info!(
            %symbol,
            %side,
            confidence = signal.confidence,
            score = signal.score,
            regime = %signal.regime,
            combo = %signal.combo_tag,
            "signal accepted"
        );
        debug!(%symbol, reasons = ?signal.reasons, "signal reasons");
        Ok(signal)
    }
}
