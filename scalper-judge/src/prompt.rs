use derive_more::Constructor;
use scalper_instrument::{Side, Symbol};
use scalper_ta::IndicatorSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

const SYSTEM_PROMPT: &str = "You are a disciplined crypto perpetual futures scalping risk manager. \
You confirm or veto trades proposed by a quantitative engine. Be conservative: when in doubt, HOLD. \
Respond ONLY with a single JSON object of the form \
{\"action\": \"LONG\" | \"SHORT\" | \"HOLD\" | \"CLOSE\", \"confidence\": <0-100>, \"reason\": \"<one sentence>\"}.";

/// System & user messages sent to the judge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Constructor)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Candidate entry to be confirmed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EntryRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub confidence: f64,
    pub score: f64,
    pub reasons: Vec<String>,
    pub regime: Option<String>,
    pub snapshot: IndicatorSnapshot,
}

/// Open position to be re-assessed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExitRequest {
    pub symbol: Symbol,
    pub side: Side,
    pub entry_price: f64,
    pub current_price: f64,
    pub roe: f64,
    pub highest_roe: f64,
    pub held_minutes: f64,
    pub snapshot: Option<IndicatorSnapshot>,
}

fn write_snapshot(out: &mut String, snapshot: &IndicatorSnapshot) {
    // Writing to a String is infallible
    let _ = writeln!(
        out,
        "Price: {:.6}\nRSI: {:.1}\nMomentum: {:.2}% (ROC {:.2}%)\nVolume ratio: {:.2}\n\
         Trend: {} (strength {:.2})\nEMA 9/21/50: {:.6} / {:.6} / {:.6}\n\
         MACD: {:.6} signal {:.6} histogram {:.6}\nBollinger %B: {:.2} width {:.2}%\n\
         Stochastic K/D: {:.1} / {:.1}\nWilliams %R: {:.1}\nATR: {:.6} ({:.2}%)",
        snapshot.price,
        snapshot.rsi,
        snapshot.momentum,
        snapshot.roc,
        snapshot.volume_ratio,
        snapshot.trend,
        snapshot.trend_strength,
        snapshot.ema9,
        snapshot.ema21,
        snapshot.ema50,
        snapshot.macd.macd,
        snapshot.macd.signal,
        snapshot.macd.histogram,
        snapshot.bollinger.percent_b,
        snapshot.bollinger.width_percent,
        snapshot.stochastic.k,
        snapshot.stochastic.d,
        snapshot.williams_r,
        snapshot.atr,
        snapshot.atr_percent,
    );
    if let Some(divergence) = &snapshot.divergence {
        let _ = writeln!(
            out,
            "Divergence: {} (strength {:.0})",
            divergence.kind, divergence.strength
        );
    }
}

impl EntryRequest {
    pub fn prompt(&self) -> Prompt {
        let mut user = format!(
            "Proposed {} entry on {}.\nEngine confidence: {:.0} (score {:.1})\n",
            self.side, self.symbol, self.confidence, self.score
        );
        if let Some(regime) = &self.regime {
            let _ = writeln!(user, "Market regime: {regime}");
        }
        write_snapshot(&mut user, &self.snapshot);
        if !self.reasons.is_empty() {
            let _ = writeln!(user, "Signals:\n- {}", self.reasons.join("\n- "));
        }
        let _ = write!(
            user,
            "Answer {} to confirm the entry, or HOLD to veto it.",
            self.side
        );

        Prompt::new(SYSTEM_PROMPT.to_owned(), user)
    }
}

impl ExitRequest {
    pub fn prompt(&self) -> Prompt {
        let mut user = format!(
            "Open {} position on {}.\nEntry: {:.6} Current: {:.6}\nROE: {:.2}% (peak {:.2}%)\nHeld: {:.1} minutes\n",
            self.side,
            self.symbol,
            self.entry_price,
            self.current_price,
            self.roe,
            self.highest_roe,
            self.held_minutes
        );
        if let Some(snapshot) = &self.snapshot {
            write_snapshot(&mut user, snapshot);
        }
        user.push_str("Answer CLOSE to exit now, or HOLD to keep the position open.");

        Prompt::new(SYSTEM_PROMPT.to_owned(), user)
    }
}
