use crate::position::Position;
use chrono::{DateTime, TimeDelta, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Peak protection tier: exit once the peak ROE reached `min_peak_roe` and the position has
/// given back at least `max_giveback_roe` from it.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct PeakTier {
    pub min_peak_roe: f64,
    pub max_giveback_roe: f64,
}

/// Exit ladder configuration. ROE values are percentages, pnl values USD.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExitConfig {
    pub take_profit_roe: f64,
    pub min_profit_usd: f64,
    /// Partial profit triggers at this fraction of the take profit ROE.
    pub partial_profit_at: f64,
    /// Fraction of the remaining size closed by the partial.
    pub partial_close_fraction: f64,
    pub partial_min_profit_usd: f64,
    pub stop_loss_roe: f64,
    /// Stop loss fires at this fraction of the stop distance.
    pub stop_loss_trigger: f64,
    /// Emergency exit fires at this multiple of the stop distance.
    pub emergency_trigger: f64,
    pub profit_lock_activation_roe: f64,
    pub profit_lock_floor_roe: f64,
    pub peak_tiers: Vec<PeakTier>,
    pub trailing_activation_roe: f64,
    pub trailing_distance_roe: f64,
    pub time_exit_secs: i64,
    pub time_exit_max_roe: f64,
    pub time_exit_max_pnl_usd: f64,
    pub break_even_activation_roe: f64,
    pub break_even_floor_roe: f64,
    pub max_hold_secs: i64,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            take_profit_roe: 2.0,
            min_profit_usd: 0.20,
            partial_profit_at: 0.6,
            partial_close_fraction: 0.5,
            partial_min_profit_usd: 0.15,
            stop_loss_roe: 1.5,
            stop_loss_trigger: 0.9,
            emergency_trigger: 1.5,
            profit_lock_activation_roe: 0.3,
            profit_lock_floor_roe: 0.1,
            peak_tiers: vec![
                PeakTier {
                    min_peak_roe: 1.0,
                    max_giveback_roe: 0.5,
                },
                PeakTier {
                    min_peak_roe: 0.3,
                    max_giveback_roe: 0.3,
                },
            ],
            trailing_activation_roe: 0.5,
            trailing_distance_roe: 0.25,
            time_exit_secs: 300,
            time_exit_max_roe: 0.2,
            time_exit_max_pnl_usd: 0.10,
            break_even_activation_roe: 0.15,
            break_even_floor_roe: 0.0,
            max_hold_secs: 1_800,
        }
    }
}

/// Why the exit ladder fired.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    #[display("partial_profit")]
    PartialProfit,
    #[display("take_profit")]
    TakeProfit,
    #[display("emergency_exit")]
    EmergencyExit,
    #[display("stop_loss")]
    StopLoss,
    #[display("profit_lock")]
    ProfitLock,
    #[display("peak_protection")]
    PeakProtection,
    #[display("trailing_stop")]
    TrailingStop,
    #[display("time_exit")]
    TimeExit,
    #[display("break_even")]
    BreakEven,
    #[display("max_hold_time")]
    MaxHoldTime,
    /// Closed on the judge's recommendation.
    #[display("judge_exit")]
    JudgeExit,
}

#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub enum ExitAction {
    Hold,
    /// Close `size` units, keeping the remainder open.
    PartialClose { size: f64 },
    Close,
}

/// Result of one [`update`]: the re-marked position and exactly one action.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PositionUpdate {
    pub position: Position,
    pub action: ExitAction,
    /// `None` when holding.
    pub reason: Option<ExitReason>,
}

impl PositionUpdate {
    fn hold(position: Position) -> Self {
        Self {
            position,
            action: ExitAction::Hold,
            reason: None,
        }
    }

    fn close(position: Position, reason: ExitReason) -> Self {
        Self {
            position,
            action: ExitAction::Close,
            reason: Some(reason),
        }
    }
}

/// Re-mark `position` at `price` and evaluate the exit ladder. First match wins:
///
/// 1. partial profit
/// 2. take profit
/// 3. emergency exit, then stop loss
/// 4. profit lock (only before the trailing stop activates)
/// 5. peak protection
/// 6. trailing stop
/// 7. time exit for stagnant trades
/// 8. break even
/// 9. max hold time
pub fn update(position: &Position, price: f64, now: DateTime<Utc>, config: &ExitConfig) -> PositionUpdate {
    let next = mark(position, price, config);
    let roe = next.unrealised_roe;
    let pnl = next.unrealised_pnl;
    let held = next.held(now);

    let take_profit = next.dynamic_take_profit.unwrap_or(config.take_profit_roe);
    let stop_loss = next.dynamic_stop_loss.unwrap_or(config.stop_loss_roe);

    if !next.partial_taken
        && roe >= take_profit * config.partial_profit_at
        && pnl >= config.partial_min_profit_usd
    {
        let size = next.size * config.partial_close_fraction;
        return PositionUpdate {
            position: next,
            action: ExitAction::PartialClose { size },
            reason: Some(ExitReason::PartialProfit),
        };
    }

    let reason = if roe >= take_profit && pnl >= config.min_profit_usd {
        Some(ExitReason::TakeProfit)
    } else if roe <= -stop_loss * config.emergency_trigger {
        Some(ExitReason::EmergencyExit)
    } else if roe <= -stop_loss * config.stop_loss_trigger {
        Some(ExitReason::StopLoss)
    } else if next.profit_lock_armed && !next.trailing.active && roe <= config.profit_lock_floor_roe {
        Some(ExitReason::ProfitLock)
    } else if config.peak_tiers.iter().any(|tier| {
        next.highest_roe >= tier.min_peak_roe && next.highest_roe - roe >= tier.max_giveback_roe
    }) {
        Some(ExitReason::PeakProtection)
    } else if next.trailing.active && roe <= next.trailing.stop_roe {
        Some(ExitReason::TrailingStop)
    } else if held >= TimeDelta::seconds(config.time_exit_secs)
        && roe < config.time_exit_max_roe
        && pnl < config.time_exit_max_pnl_usd
    {
        Some(ExitReason::TimeExit)
    } else if next.break_even_armed && roe <= config.break_even_floor_roe {
        Some(ExitReason::BreakEven)
    } else if held >= TimeDelta::seconds(config.max_hold_secs) {
        Some(ExitReason::MaxHoldTime)
    } else {
        None
    };

    match reason {
        Some(reason) => PositionUpdate::close(next, reason),
        None => PositionUpdate::hold(next),
    }
}

/// Recompute pnl & ROE, ratchet the extremes and arm the protective stops.
fn mark(position: &Position, price: f64, config: &ExitConfig) -> Position {
    let mut next = position.clone();
    next.current_price = price;
    next.unrealised_pnl = next.pnl_at(price);
    next.unrealised_roe = next.roe_at(price);
    next.highest_roe = next.highest_roe.max(next.unrealised_roe);
    next.lowest_roe = next.lowest_roe.min(next.unrealised_roe);

    let roe = next.unrealised_roe;
    if roe >= config.profit_lock_activation_roe {
        next.profit_lock_armed = true;
    }
    if roe >= config.break_even_activation_roe {
        next.break_even_armed = true;
    }

    let trail_to = next.highest_roe - config.trailing_distance_roe;
    if next.trailing.active {
        next.trailing.stop_roe = next.trailing.stop_roe.max(trail_to);
    } else if roe >= config.trailing_activation_roe {
        next.trailing.active = true;
        next.trailing.stop_roe = trail_to;
    }

    next
}
