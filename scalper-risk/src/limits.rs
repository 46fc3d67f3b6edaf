use chrono::{DateTime, NaiveDate, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Account level limits checked before opening new positions.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskLimits {
    pub max_open_positions: usize,
    /// Realised loss (USD, positive) after which no new positions are opened for the UTC day.
    pub daily_loss_limit_usd: f64,
    /// Consecutive losing trades after which no new positions are opened for the UTC day.
    pub max_consecutive_losses: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_open_positions: 3,
            daily_loss_limit_usd: 50.0,
            max_consecutive_losses: 5,
        }
    }
}

/// Reason new entries are blocked.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Display)]
pub enum RiskViolation {
    #[display("{open} open positions, limit {limit}")]
    MaxOpenPositions { open: usize, limit: usize },
    #[display("daily pnl {pnl:.2} breaches loss limit {limit:.2}")]
    DailyLossLimit { pnl: f64, limit: f64 },
    #[display("{losses} consecutive losses, limit {limit}")]
    ConsecutiveLosses { losses: u32, limit: u32 },
}

/// Realised pnl and loss streak for the current UTC day.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct DailyRisk {
    pub day: Option<NaiveDate>,
    pub realised_pnl: f64,
    pub trades: u32,
    pub consecutive_losses: u32,
}

impl DailyRisk {
    /// Record a closed trade's realised pnl.
    pub fn record(&mut self, pnl: f64, now: DateTime<Utc>) {
        self.roll(now);
        self.realised_pnl += pnl;
        self.trades += 1;
        if pnl < 0.0 {
            self.consecutive_losses += 1;
        } else {
            self.consecutive_losses = 0;
        }
    }

    /// Check whether a new position may be opened.
    pub fn check(
        &mut self,
        open_positions: usize,
        limits: &RiskLimits,
        now: DateTime<Utc>,
    ) -> Result<(), RiskViolation> {
        self.roll(now);

        if open_positions >= limits.max_open_positions {
            return Err(RiskViolation::MaxOpenPositions {
                open: open_positions,
                limit: limits.max_open_positions,
            });
        }
        if self.realised_pnl <= -limits.daily_loss_limit_usd {
            return Err(RiskViolation::DailyLossLimit {
                pnl: self.realised_pnl,
                limit: limits.daily_loss_limit_usd,
            });
        }
        if self.consecutive_losses >= limits.max_consecutive_losses {
            return Err(RiskViolation::ConsecutiveLosses {
                losses: self.consecutive_losses,
                limit: limits.max_consecutive_losses,
            });
        }
        Ok(())
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        let today = now.date_naive();
        if self.day != Some(today) {
            if let Some(day) = self.day {
                info!(%day, pnl = self.realised_pnl, trades = self.trades, "daily risk reset");
            }
            *self = Self {
                day: Some(today),
                ..Self::default()
            };
        }
    }
}
