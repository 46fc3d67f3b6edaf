use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use scalper_instrument::{Side, Symbol};
use scalper_risk::{ExitAction, ExitConfig, ExitReason, Position, PositionSizer, update};

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 11, 16, 0, 0).unwrap()
}

/// Drive a position through a price path until it closes, applying partial closes.
fn run(mut position: Position, prices: &[f64]) -> (Position, Vec<(ExitAction, Option<ExitReason>)>) {
    let config = ExitConfig::default();
    let mut actions = Vec::new();

    for (second, price) in prices.iter().enumerate() {
        let now = start() + TimeDelta::seconds(second as i64 * 15);
        let next = update(&position, *price, now, &config);
        actions.push((next.action, next.reason));
        position = next.position;

        match next.action {
            ExitAction::Hold => {}
            ExitAction::PartialClose { size } => {
                position.reduce(size, *price);
            }
            ExitAction::Close => break,
        }
    }

    (position, actions)
}

#[test]
fn test_winner_takes_partial_then_trails_out() {
    let sizer = PositionSizer::default();
    let margin = sizer.margin(77.5, 1.0);
    let quantity = sizer.quantity(margin, 2_000.0);
    let position = Position::open(
        Symbol::from("ethusdt"),
        Side::Long,
        2_000.0,
        quantity,
        sizer.leverage,
        start(),
    );
    assert!((position.margin_used - margin).abs() < 1e-9);

    // 20x leverage: every $1 is 1% ROE
    let (position, actions) = run(
        position,
        &[2_000.2, 2_000.6, 2_001.3, 2_001.8, 2_001.9, 2_001.62],
    );

    assert_eq!(actions[0].0, ExitAction::Hold);
    assert_eq!(actions[2].1, Some(ExitReason::PartialProfit));
    assert_eq!(actions.last().map(|(_, reason)| *reason), Some(Some(ExitReason::TrailingStop)));
    assert!(position.partial_taken);
    assert!((position.highest_roe - 1.9).abs() < 1e-6);
    assert!(position.total_pnl_at(position.current_price) > 0.0);
}

#[test]
fn test_loser_is_stopped() {
    let position = Position::open(Symbol::from("SOLUSDT"), Side::Short, 150.0, 2.0, 10.0, start());

    // $30 margin, so $0.225 against is -1.5% ROE
    let (position, actions) = run(position, &[149.98, 150.05, 150.12, 150.21]);

    assert_eq!(
        actions.last().map(|(action, reason)| (*action, *reason)),
        Some((ExitAction::Close, Some(ExitReason::StopLoss)))
    );
    assert!(position.lowest_roe < -1.35);
    assert!(position.highest_roe > 0.0);
}
