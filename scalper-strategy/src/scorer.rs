use crate::config::ScoringConfig;
use derive_more::Display;
use scalper_instrument::{Candle, Side};
use scalper_ta::{
    IndicatorSnapshot, Trend,
    patterns::{CandlePattern, PatternBias, consecutive_bullish, detect_candle_pattern, higher_lows},
    trend::DivergenceKind,
};
use serde::{Deserialize, Serialize};

/// Outcome of scoring a snapshot.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Display)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[display("LONG")]
    Long,
    #[display("SHORT")]
    Short,
    /// Close to a signal but not there yet.
    #[display("WAIT")]
    Wait,
    #[display("NONE")]
    None,
}

impl Direction {
    /// Tradable [`Side`], if the direction is actionable.
    pub fn side(&self) -> Option<Side> {
        match self {
            Direction::Long => Some(Side::Long),
            Direction::Short => Some(Side::Short),
            Direction::Wait | Direction::None => None,
        }
    }
}

impl From<Side> for Direction {
    fn from(value: Side) -> Self {
        match value {
            Side::Long => Direction::Long,
            Side::Short => Direction::Short,
        }
    }
}

/// Oversold reversal detected on the latest candles.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize)]
pub struct Bounce {
    /// Number of oscillators (RSI, stochastic, Williams %R) simultaneously oversold.
    pub oversold_signals: usize,
    pub bullish_candles: usize,
    pub engulfing: bool,
    pub higher_lows: bool,
    /// Total points added to the long side.
    pub bonus: f64,
}

/// Directional score fused from an [`IndicatorSnapshot`] and its candles.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SignalScore {
    pub direction: Direction,
    pub long_score: f64,
    pub short_score: f64,
    /// Score of the stronger side.
    pub total_score: f64,
    /// [0, 100].
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub long_confluence: usize,
    pub short_confluence: usize,
    pub candle_pattern: Option<CandlePattern>,
    pub bounce: Option<Bounce>,
}

impl SignalScore {
    /// Number of indicators agreeing with the scored direction.
    pub fn confluence(&self) -> usize {
        match self.direction {
            Direction::Long => self.long_confluence,
            Direction::Short => self.short_confluence,
            Direction::Wait | Direction::None => self.long_confluence.max(self.short_confluence),
        }
    }

    /// Indicator combination tag, eg/ "ema_stack+macd_cross+rsi_extreme".
    ///
    /// Built from the reasons of the winning side and used to key learned pattern statistics.
    pub fn combo_tag(&self) -> String {
        let mut tags = self
            .reasons
            .iter()
            .filter_map(|reason| reason.split_once(':'))
            .filter(|(side, _)| match self.direction {
                Direction::Long => *side == "long",
                Direction::Short => *side == "short",
                Direction::Wait | Direction::None => true,
            })
            .map(|(_, tag)| tag.split_whitespace().next().unwrap_or(tag))
            .collect::<Vec<_>>();
        tags.sort_unstable();
        tags.dedup();
        if tags.is_empty() {
            String::from("none")
        } else {
            tags.join("+")
        }
    }
}

#[derive(Debug, Default)]
struct Tally {
    score: f64,
    confluence: usize,
}

#[derive(Debug, Default)]
struct Accumulator {
    long: Tally,
    short: Tally,
    reasons: Vec<String>,
}

impl Accumulator {
    fn add(&mut self, side: Side, points: f64, tag: &str, detail: String) {
        let tally = match side {
            Side::Long => &mut self.long,
            Side::Short => &mut self.short,
        };
        tally.score += points;
        tally.confluence += 1;
        let prefix = match side {
            Side::Long => "long",
            Side::Short => "short",
        };
        self.reasons.push(format!("{prefix}:{tag} {detail}"));
    }

    fn bonus(&mut self, side: Side, points: f64, tag: &str, detail: String) {
        self.add(side, points, tag, detail);
        match side {
            Side::Long => self.long.confluence -= 1,
            Side::Short => self.short.confluence -= 1,
        }
    }
}

/// Score the latest candle using every indicator in the snapshot.
///
/// Each agreeing indicator adds its fixed weight to the long or short accumulator. The
/// resulting [`Direction`] requires the stronger side to reach the minimum score and to
/// dominate the weaker side.
pub fn score(
    snapshot: &IndicatorSnapshot,
    candles: &[Candle],
    config: &ScoringConfig,
) -> SignalScore {
    let weights = &config.weights;
    let mut acc = Accumulator::default();

    // EMA stack
    if snapshot.ema_bull_stack() {
        acc.add(Side::Long, weights.ema_full_stack, "ema_stack", String::from("price > ema9 > ema21 > ema50"));
    } else if snapshot.ema_bear_stack() {
        acc.add(Side::Short, weights.ema_full_stack, "ema_stack", String::from("price < ema9 < ema21 < ema50"));
    } else if snapshot.price > snapshot.ema9 && snapshot.ema9 > snapshot.ema21 {
        acc.add(Side::Long, weights.ema_partial, "ema_partial", String::from("price > ema9 > ema21"));
    } else if snapshot.price < snapshot.ema9 && snapshot.ema9 < snapshot.ema21 {
        acc.add(Side::Short, weights.ema_partial, "ema_partial", String::from("price < ema9 < ema21"));
    }

    // MACD
    let macd = &snapshot.macd;
    if macd.bullish_cross {
        acc.add(Side::Long, weights.macd_cross, "macd_cross", String::from("bullish crossover"));
    } else if macd.bearish_cross {
        acc.add(Side::Short, weights.macd_cross, "macd_cross", String::from("bearish crossover"));
    } else if macd.histogram > 0.0 {
        acc.add(Side::Long, weights.macd_histogram, "macd_histogram", format!("{:.4}", macd.histogram));
    } else if macd.histogram < 0.0 {
        acc.add(Side::Short, weights.macd_histogram, "macd_histogram", format!("{:.4}", macd.histogram));
    }

    // RSI
    let rsi = snapshot.rsi;
    if rsi <= config.rsi_oversold {
        acc.add(Side::Long, weights.rsi_extreme, "rsi_extreme", format!("oversold {rsi:.1}"));
    } else if rsi >= config.rsi_overbought {
        acc.add(Side::Short, weights.rsi_extreme, "rsi_extreme", format!("overbought {rsi:.1}"));
    } else if rsi < config.rsi_long_zone {
        acc.add(Side::Long, weights.rsi_zone, "rsi_zone", format!("{rsi:.1}"));
    } else if rsi > config.rsi_short_zone {
        acc.add(Side::Short, weights.rsi_zone, "rsi_zone", format!("{rsi:.1}"));
    }

    // Stochastic
    let stoch_k = snapshot.stochastic.k;
    if stoch_k <= config.stochastic_oversold {
        acc.add(Side::Long, weights.stochastic, "stochastic", format!("oversold K {stoch_k:.1}"));
    } else if stoch_k >= config.stochastic_overbought {
        acc.add(Side::Short, weights.stochastic, "stochastic", format!("overbought K {stoch_k:.1}"));
    }

    // Williams %R
    let williams = snapshot.williams_r;
    if williams <= config.williams_oversold {
        acc.add(Side::Long, weights.williams, "williams", format!("oversold {williams:.1}"));
    } else if williams >= config.williams_overbought {
        acc.add(Side::Short, weights.williams, "williams", format!("overbought {williams:.1}"));
    }

    // Bollinger %B
    let percent_b = snapshot.bollinger.percent_b;
    if percent_b <= config.bollinger_extreme {
        acc.add(Side::Long, weights.bollinger, "bollinger", format!("%B {percent_b:.2}"));
    } else if percent_b >= 1.0 - config.bollinger_extreme {
        acc.add(Side::Short, weights.bollinger, "bollinger", format!("%B {percent_b:.2}"));
    }

    // Divergence
    if let Some(divergence) = snapshot.divergence {
        let points = if divergence.strength < config.strong_divergence {
            weights.divergence / 2.0
        } else {
            weights.divergence
        };
        let side = match divergence.kind {
            DivergenceKind::Bullish => Side::Long,
            DivergenceKind::Bearish => Side::Short,
        };
        acc.add(side, points, "divergence", format!("strength {:.0}", divergence.strength));
    }

    // Trend
    if snapshot.trend_strength >= config.min_trend_strength {
        let detail = format!("strength {:.2}", snapshot.trend_strength);
        match snapshot.trend {
            Trend::Up => acc.add(Side::Long, weights.trend, "trend", detail),
            Trend::Down => acc.add(Side::Short, weights.trend, "trend", detail),
            Trend::Sideways => {}
        }
    }

    // Momentum
    let momentum = snapshot.momentum;
    if momentum > config.momentum_threshold {
        acc.add(Side::Long, weights.momentum, "momentum", format!("{momentum:.2}%"));
    } else if momentum < -config.momentum_threshold {
        acc.add(Side::Short, weights.momentum, "momentum", format!("{momentum:.2}%"));
    }

    // Candle pattern
    let candle_pattern = detect_candle_pattern(candles);
    if let Some(pattern) = candle_pattern {
        let side = match pattern.bias() {
            PatternBias::Bullish => Side::Long,
            PatternBias::Bearish => Side::Short,
        };
        acc.add(side, weights.candle_pattern, "pattern", pattern.to_string());
    }

    // Volume spike confirms whichever side already leads
    if snapshot.volume_ratio >= config.volume_spike_ratio && acc.long.score != acc.short.score {
        let side = if acc.long.score > acc.short.score {
            Side::Long
        } else {
            Side::Short
        };
        acc.bonus(side, weights.volume_spike, "volume_spike", format!("{:.2}x", snapshot.volume_ratio));
    }

    let bounce = detect_bounce(snapshot, candles, candle_pattern, config);
    if let Some(bounce) = &bounce {
        acc.bonus(
            Side::Long,
            bounce.bonus,
            "bounce",
            format!("{} oversold, {} bullish candles", bounce.oversold_signals, bounce.bullish_candles),
        );
    }

    finalise(acc, candle_pattern, bounce, config)
}

fn detect_bounce(
    snapshot: &IndicatorSnapshot,
    candles: &[Candle],
    candle_pattern: Option<CandlePattern>,
    config: &ScoringConfig,
) -> Option<Bounce> {
    let oversold_signals = [
        snapshot.rsi <= config.rsi_oversold,
        snapshot.stochastic.k <= config.stochastic_oversold,
        snapshot.williams_r <= config.williams_oversold,
    ]
    .into_iter()
    .filter(|oversold| *oversold)
    .count();

    let bullish_candles = consecutive_bullish(candles);
    if oversold_signals < config.bounce_min_oversold
        || bullish_candles < config.bounce_min_bullish_candles
    {
        return None;
    }

    let engulfing = candle_pattern == Some(CandlePattern::BullishEngulfing);
    let higher_lows = higher_lows(candles, config.bounce_min_bullish_candles);

    let weights = &config.weights;
    let mut bonus = weights.bounce;
    if engulfing {
        bonus += weights.bounce_engulfing;
    }
    if higher_lows {
        bonus += weights.bounce_higher_lows;
    }

    Some(Bounce {
        oversold_signals,
        bullish_candles,
        engulfing,
        higher_lows,
        bonus,
    })
}

fn finalise(
    acc: Accumulator,
    candle_pattern: Option<CandlePattern>,
    bounce: Option<Bounce>,
    config: &ScoringConfig,
) -> SignalScore {
    let (long_score, short_score) = (acc.long.score, acc.short.score);
    let min = config.min_score_for_signal;

    let direction = if long_score >= min && long_score > config.dominance_ratio * short_score {
        Direction::Long
    } else if short_score >= min && short_score > config.dominance_ratio * long_score {
        Direction::Short
    } else if long_score.max(short_score) >= config.wait_ratio * min {
        Direction::Wait
    } else {
        Direction::None
    };

    let total_score = long_score.max(short_score);
    let confidence = if config.confidence_divisor > 0.0 {
        (100.0 * total_score / config.confidence_divisor).round().min(100.0)
    } else {
        0.0
    };

    SignalScore {
        direction,
        long_score,
        short_score,
        total_score,
        confidence,
        reasons: acc.reasons,
        long_confluence: acc.long.confluence,
        short_confluence: acc.short.confluence,
        candle_pattern,
        bounce,
    }
}
