use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use fnv::FnvHashMap;
use scalper::{Agent, Config, HistoricalMarketData, PaperExecution};
use scalper_instrument::{Candle, Symbol};
use scalper_judge::HttpJudgeClient;
use scalper_memory::{MemorySystem, Outcome};
use std::sync::Arc;
use tempfile::TempDir;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 1, 9, 0, 0).unwrap()
}

/// Gently rising series with a shallow pullback every third bar, followed by `tail` closes given
/// relative to the last close of the rise.
fn series(base: f64, tail: &[f64]) -> Vec<Candle> {
    let mut closes = (0..120)
        .map(|index| {
            let wobble = if index % 3 == 0 { -0.0015 } else { 0.001 };
            base * (1.0 + index as f64 * 0.0005 + wobble)
        })
        .collect::<Vec<_>>();
    let entry = closes[closes.len() - 1];
    closes.extend(tail.iter().map(|ratio| entry * ratio));

    closes
        .iter()
        .enumerate()
        .map(|(index, close)| {
            let open_time = start() + TimeDelta::minutes(index as i64);
            let open = if index == 0 { *close } else { closes[index - 1] };
            Candle {
                open_time,
                open,
                high: open.max(*close) * 1.0002,
                low: open.min(*close) * 0.9998,
                close: *close,
                volume: 500.0 + index as f64,
                close_time: open_time + TimeDelta::seconds(59),
            }
        })
        .collect()
}

fn config(memory_path: &std::path::Path) -> Config {
    let mut config = serde_json::from_value::<Config>(serde_json::json!({
        "symbols": ["BTCUSDT", "ETHUSDT"],
        "strategy": {
            "scoring": {
                "weights": {
                    "ema_full_stack": 15.0, "ema_partial": 15.0, "macd_cross": 0.0,
                    "macd_histogram": 0.0, "rsi_extreme": 0.0, "rsi_zone": 0.0,
                    "stochastic": 0.0, "williams": 0.0, "bollinger": 0.0, "divergence": 0.0,
                    "trend": 0.0, "momentum": 0.0, "candle_pattern": 0.0, "volume_spike": 0.0,
                    "bounce": 0.0, "bounce_engulfing": 0.0, "bounce_higher_lows": 0.0
                },
                "min_score_for_signal": 10.0,
                "confidence_divisor": 20.0
            },
            "validation": {
                "min_score": 10.0,
                "min_volume_ratio": 0.0,
                "max_momentum": 100.0,
                "rsi_long_max": 100.0,
                "check_trend_alignment": false
            }
        },
        "sizing": {"min_margin_usd": 50.0, "max_margin_usd": 50.0},
        "limits": {"max_open_positions": 2}
    }))
    .unwrap();
    config.memory.base_path = memory_path.to_path_buf();
    config
}

#[tokio::test]
async fn test_replay_learns_and_persists() {
    let tmp = TempDir::new().unwrap();
    let config = config(tmp.path());

    // BTCUSDT rallies through its targets, ETHUSDT gaps down through its stop
    let mut candles = FnvHashMap::default();
    candles.insert(Symbol::from("BTCUSDT"), series(60_000.0, &[1.002, 1.004]));
    candles.insert(Symbol::from("ETHUSDT"), series(3_000.0, &[0.996, 0.996]));
    let market = Arc::new(HistoricalMarketData::new(candles, 120));

    let mut agent = Agent::<_, _, HttpJudgeClient>::new(
        &config,
        Arc::clone(&market),
        PaperExecution::new(Arc::clone(&market), 0.0),
        None,
        MemorySystem::load(config.memory.clone()),
    );

    while let Some(now) = market.time() {
        agent.tick(now).await;
        if !market.advance() {
            break;
        }
    }
    let counters = agent.shutdown();

    assert_eq!(counters.opened, counters.closed + agent.positions().count() as u64);
    assert!(counters.closed >= 2);

    let btc = agent
        .memory()
        .history()
        .by_symbol(&Symbol::from("BTCUSDT"))
        .next()
        .cloned()
        .unwrap();
    assert_eq!(btc.outcome, Outcome::Win);
    assert_eq!(btc.exit.exit_reason, "take_profit");

    let eth = agent
        .memory()
        .history()
        .by_symbol(&Symbol::from("ETHUSDT"))
        .next()
        .cloned()
        .unwrap();
    assert_eq!(eth.outcome, Outcome::Loss);
    assert_eq!(eth.exit.exit_reason, "emergency_exit");

    // Restarted memory remembers both trades and prefers the winning symbol
    let restored = MemorySystem::load(config.memory.clone());
    assert_eq!(restored.history().len(), agent.memory().history().len());
    let ranked = restored.rank_symbols(config.symbols.iter());
    assert_eq!(ranked[0].0, Symbol::from("BTCUSDT"));
    assert!(ranked[0].1 > ranked[1].1);
}
