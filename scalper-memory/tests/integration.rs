use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use scalper_instrument::{Side, Symbol};
use scalper_memory::{
    MemoryConfig, MemorySystem, Outcome, PatternQuery, Regime, TradeContext, TradeExit,
    TradeMemory,
};
use tempfile::TempDir;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap()
}

fn closed_trade(symbol: &str, side: Side, combo_tag: &str, pnl: f64, offset_minutes: i64) -> TradeMemory {
    let entry_time = start() + TimeDelta::minutes(offset_minutes);
    TradeMemory::new(
        TradeContext {
            symbol: Symbol::from(symbol),
            side,
            entry_price: 2_500.0,
            entry_time,
            leverage: 20.0,
            entry_snapshot: None,
            entry_score: 64.0,
            confidence: 71.0,
            combo_tag: combo_tag.to_owned(),
            regime: Some(Regime::Ranging),
            judge_agreed: None,
        },
        TradeExit {
            exit_price: 2_500.0 + side.sign() * pnl,
            exit_time: entry_time + TimeDelta::minutes(4),
            realised_pnl: pnl,
            realised_roe: pnl * 2.0,
            exit_reason: String::from("take_profit"),
        },
    )
}

#[test]
fn test_memory_learns_and_survives_restart() {
    let tmp = TempDir::new().unwrap();
    let config = MemoryConfig {
        base_path: tmp.path().to_path_buf(),
        ..MemoryConfig::default()
    };

    let mut memory = MemorySystem::load(config.clone());
    assert!(memory.history().is_empty());

    // ETHUSDT shorts on this combo keep losing, BTCUSDT longs keep winning
    for index in 0..6 {
        memory.record_trade(closed_trade("ETHUSDT", Side::Short, "bollinger+rsi_extreme", -2.0, index));
        memory.record_trade(closed_trade("BTCUSDT", Side::Long, "ema_stack+macd_cross", 3.0, index));
    }
    memory.shutdown();

    let restored = MemorySystem::load(config);
    assert_eq!(restored.history().len(), 12);
    assert_eq!(restored.stats().wins, 6);
    assert_eq!(restored.stats().losses, 6);
    assert!(
        restored
            .history()
            .iter()
            .all(|trade| trade.outcome == Outcome::classify(trade.pnl()))
    );

    let ranked = restored
        .rank_symbols([Symbol::from("ETHUSDT"), Symbol::from("BTCUSDT")].iter())
        .into_iter()
        .map(|(symbol, _)| symbol)
        .collect::<Vec<_>>();
    assert_eq!(ranked, vec![Symbol::from("BTCUSDT"), Symbol::from("ETHUSDT")]);

    // The losing combo on a fresh query is rejected outright
    let losing = PatternQuery {
        combo_tag: String::from("bollinger+rsi_extreme"),
        confidence: 71.0,
        regime: Some(Regime::Ranging),
        hour: 14,
        symbol: Symbol::from("ETHUSDT"),
        judge_agreed: None,
    };
    let boost = restored.patterns().boost(&losing);
    assert!(boost.strongly_negative);
    assert_eq!(boost.confidence, -10.0);

    let winning = PatternQuery {
        combo_tag: String::from("ema_stack+macd_cross"),
        symbol: Symbol::from("BTCUSDT"),
        ..losing
    };
    assert!(restored.patterns().boost(&winning).confidence > 0.0);
}
