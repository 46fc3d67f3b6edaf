use crate::{
    config::ValidationConfig,
    scorer::{Direction, SignalScore},
};
use derive_more::Display;
use scalper_ta::{IndicatorSnapshot, Trend};
use serde::{Deserialize, Serialize};

/// Hard filter that blocks a scored candidate.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize, Display)]
pub enum Rejection {
    #[display("score {score:.1} below minimum {minimum:.1}")]
    ScoreBelowMinimum { score: f64, minimum: f64 },
    #[display("RSI {rsi:.1} too extreme for {direction} (limit {limit:.1})")]
    RsiExtreme {
        direction: Direction,
        rsi: f64,
        limit: f64,
    },
    #[display("volume ratio {ratio:.2} below minimum {minimum:.2}")]
    VolumeTooLow { ratio: f64, minimum: f64 },
    #[display("momentum {momentum:.2}% exceeds ceiling {maximum:.2}%")]
    MomentumChasing { momentum: f64, maximum: f64 },
    #[display("weak {direction} against {trend} trend (strength {strength:.2})")]
    WeakCounterTrend {
        direction: Direction,
        trend: Trend,
        strength: f64,
    },
}

impl Rejection {
    /// Critical rejections (score & RSI) invalidate the candidate outright, the rest are
    /// market condition filters.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Rejection::ScoreBelowMinimum { .. } | Rejection::RsiExtreme { .. }
        )
    }
}

/// Soft check that failed but still permits the trade.
#[derive(Debug, Copy, Clone, PartialEq, Deserialize, Serialize, Display)]
pub enum Warning {
    #[display("{direction} not aligned with {trend} trend")]
    TrendMisaligned { direction: Direction, trend: Trend },
    #[display("volume ratio {ratio:.2} does not confirm the move")]
    VolumeUnconfirmed { ratio: f64 },
    #[display("confluence {count} below {minimum}")]
    LowConfluence { count: usize, minimum: usize },
}

/// Result of [`validate`].
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Validation {
    pub rejections: Vec<Rejection>,
    pub warnings: Vec<Warning>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.rejections.is_empty()
    }

    pub fn has_critical(&self) -> bool {
        self.rejections.iter().any(Rejection::is_critical)
    }
}

/// RSI hard gate: no longs into overbought, no shorts into oversold.
pub fn check_rsi(
    direction: Direction,
    snapshot: &IndicatorSnapshot,
    config: &ValidationConfig,
) -> Option<Rejection> {
    match direction {
        Direction::Long if snapshot.rsi > config.rsi_long_max => Some(Rejection::RsiExtreme {
            direction,
            rsi: snapshot.rsi,
            limit: config.rsi_long_max,
        }),
        Direction::Short if snapshot.rsi < config.rsi_short_min => Some(Rejection::RsiExtreme {
            direction,
            rsi: snapshot.rsi,
            limit: config.rsi_short_min,
        }),
        _ => None,
    }
}

/// Counter-trend hard gate.
///
/// Trading against the trend is only rejected for weak candidates, ie/ those scoring below
/// `min_score * weak_counter_trend_factor` against a trend of at least
/// `counter_trend_min_strength`.
pub fn check_counter_trend(
    score: &SignalScore,
    snapshot: &IndicatorSnapshot,
    config: &ValidationConfig,
) -> Option<Rejection> {
    if !is_counter_trend(score.direction, snapshot.trend) {
        return None;
    }

    let weak = score.total_score < config.min_score * config.weak_counter_trend_factor;
    let strong_trend = snapshot.trend_strength >= config.counter_trend_min_strength;

    (weak && strong_trend).then_some(Rejection::WeakCounterTrend {
        direction: score.direction,
        trend: snapshot.trend,
        strength: snapshot.trend_strength,
    })
}

fn is_counter_trend(direction: Direction, trend: Trend) -> bool {
    matches!(
        (direction, trend),
        (Direction::Long, Trend::Down) | (Direction::Short, Trend::Up)
    )
}

/// Apply every hard filter and soft check to a scored candidate.
pub fn validate(
    score: &SignalScore,
    snapshot: &IndicatorSnapshot,
    config: &ValidationConfig,
) -> Validation {
    let mut validation = Validation::default();

    let actionable = score.direction.side().is_some();
    if !actionable || score.total_score < config.min_score {
        validation.rejections.push(Rejection::ScoreBelowMinimum {
            score: score.total_score,
            minimum: config.min_score,
        });
    }

    validation
        .rejections
        .extend(check_rsi(score.direction, snapshot, config));

    if snapshot.volume_ratio < config.min_volume_ratio {
        validation.rejections.push(Rejection::VolumeTooLow {
            ratio: snapshot.volume_ratio,
            minimum: config.min_volume_ratio,
        });
    }

    if snapshot.momentum.abs() > config.max_momentum {
        validation.rejections.push(Rejection::MomentumChasing {
            momentum: snapshot.momentum,
            maximum: config.max_momentum,
        });
    }

    if config.check_trend_alignment && is_counter_trend(score.direction, snapshot.trend) {
        match check_counter_trend(score, snapshot, config) {
            Some(rejection) => validation.rejections.push(rejection),
            None => validation.warnings.push(Warning::TrendMisaligned {
                direction: score.direction,
                trend: snapshot.trend,
            }),
        }
    }

    if config.check_volume_confirmation
        && snapshot.volume_ratio >= config.min_volume_ratio
        && snapshot.volume_ratio < config.volume_confirmation_ratio
    {
        validation.warnings.push(Warning::VolumeUnconfirmed {
            ratio: snapshot.volume_ratio,
        });
    }

    let confluence = score.confluence();
    if confluence < config.min_confluence {
        validation.warnings.push(Warning::LowConfluence {
            count: confluence,
            minimum: config.min_confluence,
        });
    }

    validation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::tests::{bullish_snapshot, neutral_snapshot};

    fn long_score(total: f64, confluence: usize) -> SignalScore {
        SignalScore {
            direction: Direction::Long,
            long_score: total,
            short_score: 0.0,
            total_score: total,
            confidence: (100.0 * total / 110.0).round(),
            reasons: vec![],
            long_confluence: confluence,
            short_confluence: 0,
            candle_pattern: None,
            bounce: None,
        }
    }

    #[test]
    fn test_validate() {
        struct TestCase {
            score: SignalScore,
            snapshot: IndicatorSnapshot,
            expected_rejections: Vec<Rejection>,
            expected_warnings: Vec<Warning>,
        }

        let confirmed_volume = IndicatorSnapshot {
            volume_ratio: 1.5,
            ..bullish_snapshot()
        };

        let cases = vec![
            // TC0: clean long
            TestCase {
                score: long_score(60.0, 5),
                snapshot: confirmed_volume,
                expected_rejections: vec![],
                expected_warnings: vec![],
            },
            // TC1: score below minimum is critical
            TestCase {
                score: long_score(40.0, 5),
                snapshot: confirmed_volume,
                expected_rejections: vec![Rejection::ScoreBelowMinimum {
                    score: 40.0,
                    minimum: 50.0,
                }],
                expected_warnings: vec![],
            },
            // TC2: overbought long
            TestCase {
                score: long_score(60.0, 5),
                snapshot: IndicatorSnapshot {
                    rsi: 80.0,
                    ..confirmed_volume
                },
                expected_rejections: vec![Rejection::RsiExtreme {
                    direction: Direction::Long,
                    rsi: 80.0,
                    limit: 75.0,
                }],
                expected_warnings: vec![],
            },
            // TC3: thin volume and chasing
            TestCase {
                score: long_score(60.0, 5),
                snapshot: IndicatorSnapshot {
                    volume_ratio: 0.5,
                    momentum: 3.5,
                    ..bullish_snapshot()
                },
                expected_rejections: vec![
                    Rejection::VolumeTooLow {
                        ratio: 0.5,
                        minimum: 0.8,
                    },
                    Rejection::MomentumChasing {
                        momentum: 3.5,
                        maximum: 3.0,
                    },
                ],
                expected_warnings: vec![],
            },
            // TC4: weak long against a strong downtrend
            TestCase {
                score: long_score(60.0, 5),
                snapshot: IndicatorSnapshot {
                    trend: Trend::Down,
                    trend_strength: 0.7,
                    ..confirmed_volume
                },
                expected_rejections: vec![Rejection::WeakCounterTrend {
                    direction: Direction::Long,
                    trend: Trend::Down,
                    strength: 0.7,
                }],
                expected_warnings: vec![],
            },
            // TC5: strong long against a downtrend only warns
            TestCase {
                score: long_score(70.0, 5),
                snapshot: IndicatorSnapshot {
                    trend: Trend::Down,
                    trend_strength: 0.7,
                    ..confirmed_volume
                },
                expected_rejections: vec![],
                expected_warnings: vec![Warning::TrendMisaligned {
                    direction: Direction::Long,
                    trend: Trend::Down,
                }],
            },
            // TC6: unconfirmed volume & low confluence warn
            TestCase {
                score: long_score(60.0, 2),
                snapshot: bullish_snapshot(),
                expected_rejections: vec![],
                expected_warnings: vec![
                    Warning::VolumeUnconfirmed { ratio: 1.0 },
                    Warning::LowConfluence {
                        count: 2,
                        minimum: 3,
                    },
                ],
            },
        ];

        for (index, test) in cases.into_iter().enumerate() {
            let actual = validate(&test.score, &test.snapshot, &ValidationConfig::default());
            assert_eq!(actual.rejections, test.expected_rejections, "TC{index} failed");
            assert_eq!(actual.warnings, test.expected_warnings, "TC{index} failed");
        }
    }

    #[test]
    fn test_non_directional_score_rejected() {
        let mut score = long_score(45.0, 1);
        score.direction = Direction::Wait;

        let actual = validate(&score, &neutral_snapshot(), &ValidationConfig::default());
        assert!(!actual.is_valid());
        assert!(actual.has_critical());
    }

    #[test]
    fn test_rejection_criticality() {
        assert!(
            Rejection::ScoreBelowMinimum {
                score: 1.0,
                minimum: 2.0
            }
            .is_critical()
        );
        assert!(
            !Rejection::VolumeTooLow {
                ratio: 0.1,
                minimum: 0.8
            }
            .is_critical()
        );
    }
}
