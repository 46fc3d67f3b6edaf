use derive_more::Constructor;
use serde::{Deserialize, Serialize};

/// Sizes new positions by signal confidence and the market regime's size multiplier.
///
/// Margin scales linearly from `min_margin_usd` at `min_confidence` to `max_margin_usd` at
/// `max_confidence`, is multiplied by the regime multiplier, and is clamped to the bounds.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize, Constructor)]
#[serde(default)]
pub struct PositionSizer {
    pub leverage: f64,
    pub min_margin_usd: f64,
    pub max_margin_usd: f64,
    pub min_confidence: f64,
    pub max_confidence: f64,
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self {
            leverage: 20.0,
            min_margin_usd: 5.0,
            max_margin_usd: 20.0,
            min_confidence: 60.0,
            max_confidence: 95.0,
        }
    }
}

impl PositionSizer {
    /// Margin (USD) to commit for a signal of `confidence`.
    pub fn margin(&self, confidence: f64, size_multiplier: f64) -> f64 {
        let span = (self.max_confidence - self.min_confidence).max(f64::EPSILON);
        let fraction = ((confidence - self.min_confidence) / span).clamp(0.0, 1.0);
        let margin = self.min_margin_usd + fraction * (self.max_margin_usd - self.min_margin_usd);
        (margin * size_multiplier.max(0.0)).clamp(self.min_margin_usd, self.max_margin_usd)
    }

    /// Quantity of the contract bought with `margin` at `price`.
    pub fn quantity(&self, margin: f64, price: f64) -> f64 {
        if price <= 0.0 {
            return 0.0;
        }
        margin * self.leverage / price
    }
}
