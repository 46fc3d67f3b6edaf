use crate::trade::Outcome;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Tunables of a [`Tuner`].
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Decisive trades observed before any adjustment is made.
    pub min_trades: u32,
    /// Smoothing factor of the exponentially weighted win rate.
    pub smoothing: f64,
    pub tighten_below: f64,
    pub relax_above: f64,
    /// Adjustment per trade while outside the neutral band.
    pub step: f64,
    /// Maximum tightening, eg/ 0.30 => gates up to 30% stricter.
    pub max_tighten: f64,
    /// Maximum relaxation, eg/ 0.20 => gates up to 20% looser.
    pub max_relax: f64,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            min_trades: 10,
            smoothing: 0.1,
            tighten_below: 0.4,
            relax_above: 0.6,
            step: 0.05,
            max_tighten: 0.30,
            max_relax: 0.20,
        }
    }
}

/// Tightens or relaxes a family of entry gates from the smoothed win rate of recent trades.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuner {
    name: &'static str,
    config: TunerConfig,
    observed: u32,
    /// Exponentially weighted win rate, starting from a neutral 0.5.
    win_rate: f64,
    /// Fractional change applied to gate thresholds: positive tightens.
    adjustment: f64,
}

impl Tuner {
    pub fn new(name: &'static str, config: TunerConfig) -> Self {
        Self {
            name,
            config,
            observed: 0,
            win_rate: 0.5,
            adjustment: 0.0,
        }
    }

    pub fn observed(&self) -> u32 {
        self.observed
    }

    pub fn win_rate(&self) -> f64 {
        self.win_rate
    }

    pub fn adjustment(&self) -> f64 {
        self.adjustment
    }

    /// Multiplier for minimum-style gates: `> 1.0` demands more from a candidate.
    pub fn multiplier(&self) -> f64 {
        1.0 + self.adjustment
    }

    /// Breakeven outcomes carry no signal and are ignored.
    pub fn observe(&mut self, outcome: Outcome) {
        let sample = match outcome {
            Outcome::Win => 1.0,
            Outcome::Loss => 0.0,
            Outcome::Breakeven => return,
        };

        self.observed += 1;
        self.win_rate += self.config.smoothing * (sample - self.win_rate);
        let win_rate = self.win_rate;

        if self.observed < self.config.min_trades {
            return;
        }

        let previous = self.adjustment;
        if win_rate < self.config.tighten_below {
            self.adjustment = (self.adjustment + self.config.step).min(self.config.max_tighten);
        } else if win_rate > self.config.relax_above {
            self.adjustment = (self.adjustment - self.config.step).max(-self.config.max_relax);
        }

        if self.adjustment != previous {
            info!(
                tuner = self.name,
                win_rate,
                adjustment = self.adjustment,
                "entry gates retuned"
            );
        }
    }
}

/// Minimum entry thresholds, before or after memory adjustment.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct Thresholds {
    pub min_confidence: f64,
    pub min_score: f64,
    pub min_volume_ratio: f64,
    pub min_trend_strength: f64,
}

impl Thresholds {
    /// Scale confidence / score gates by the threshold tuner and volume / trend gates by the
    /// filter tuner.
    pub fn adjusted(&self, thresholds: &Tuner, filter: &Tuner) -> Self {
        Self {
            min_confidence: (self.min_confidence * thresholds.multiplier()).min(100.0),
            min_score: self.min_score * thresholds.multiplier(),
            min_volume_ratio: self.min_volume_ratio * filter.multiplier(),
            min_trend_strength: (self.min_trend_strength * filter.multiplier()).min(1.0),
        }
    }
}
