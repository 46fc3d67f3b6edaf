use fnv::FnvHashMap;
use scalper::{
    Agent, Config, ConfigError, HistoricalMarketData, MarketData, Orchestrator, PaperExecution,
    ScalperError, config::read_json, logging::init_logging,
};
use scalper_instrument::{Candle, Symbol};
use scalper_judge::{HttpJudgeClient, JudgeGateway};
use scalper_memory::MemorySystem;
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_CONFIG_PATH: &str = "scalper.json";
const USAGE: &str = "usage: scan <candles.json> [config.json] [--replay]";

/// Scan a candle set for entry signals.
///
/// `candles.json` maps symbols to candle series, oldest first. By default the latest bar of every
/// symbol is evaluated once and accepted signals are printed as JSON lines. With `--replay` the
/// full series is replayed bar by bar through a paper trading agent, whose closed trades are
/// learned by (and persisted to) memory.
#[tokio::main]
async fn main() -> Result<(), ScalperError> {
    init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let replay = args.iter().any(|arg| arg == "--replay");
    let mut paths = args.iter().filter(|arg| !arg.starts_with("--"));
    let Some(candles_path) = paths.next() else {
        eprintln!("{USAGE}");
        return Ok(());
    };
    let config_path = paths.next().map_or(DEFAULT_CONFIG_PATH, String::as_str);

    let mut config = match Config::from_path(config_path) {
        Ok(config) => config,
        Err(error @ ConfigError::Io { .. }) => {
            warn!(%error, "using default config");
            Config::default()
        }
        Err(error) => return Err(error.into()),
    };
    let series = read_json::<FnvHashMap<Symbol, Vec<Candle>>>(candles_path)?;
    if config.symbols.is_empty() {
        config.symbols = series.keys().cloned().collect();
        config.symbols.sort();
    }

    let judge = init_judge(&config)?;
    let memory = MemorySystem::load(config.memory.clone());

    if replay {
        run_replay(&config, series, judge, memory).await
    } else {
        run_scan(&config, series, judge, memory).await
    }
}

fn init_judge(config: &Config) -> Result<Option<JudgeGateway<HttpJudgeClient>>, ScalperError> {
    if !config.judge.enabled {
        return Ok(None);
    }

    let client = HttpJudgeClient::new(
        config.judge.base_url.clone(),
        config.judge.api_key.as_deref(),
        config.judge.model.as_str(),
        config.judge.temperature,
        config.judge.max_tokens,
        config.judge.request_timeout(),
    )?;
    Ok(Some(JudgeGateway::new(client, config.judge.clone())))
}

async fn run_scan(
    config: &Config,
    series: FnvHashMap<Symbol, Vec<Candle>>,
    judge: Option<JudgeGateway<HttpJudgeClient>>,
    mut memory: MemorySystem,
) -> Result<(), ScalperError> {
    let market = HistoricalMarketData::new(series, usize::MAX);
    let Some(now) = market.time() else {
        return Ok(());
    };
    let orchestrator = Orchestrator::new(
        config.orchestrator.clone(),
        config.indicators,
        config.strategy,
        judge,
    );

    for (symbol, priority) in memory.rank_symbols(config.symbols.iter()) {
        let candles = market.klines(&symbol, config.agent.kline_limit).await?;
        match orchestrator.evaluate(&mut memory, &symbol, &candles, now).await {
            Ok(signal) => match serde_json::to_string(&signal) {
                Ok(json) => println!("{json}"),
                Err(error) => warn!(%symbol, %error, "failed to serialise signal"),
            },
            Err(rejection) => info!(%symbol, priority, %rejection, "no entry"),
        }
    }
    Ok(())
}

async fn run_replay(
    config: &Config,
    series: FnvHashMap<Symbol, Vec<Candle>>,
    judge: Option<JudgeGateway<HttpJudgeClient>>,
    memory: MemorySystem,
) -> Result<(), ScalperError> {
    let warmup = config.indicators.min_candles();
    let market = Arc::new(HistoricalMarketData::new(series, warmup));
    let execution = PaperExecution::new(Arc::clone(&market), 0.0);
    let mut agent = Agent::new(config, Arc::clone(&market), execution, judge, memory);

    while let Some(now) = market.time() {
        agent.tick(now).await;
        if !market.advance() {
            break;
        }
    }

    let stats = agent.memory().stats();
    info!(
        trades = stats.total,
        wins = stats.wins,
        losses = stats.losses,
        win_rate = stats.win_rate,
        pnl = stats.total_pnl,
        counters = ?agent.counters(),
        "replay finished"
    );
    agent.shutdown();
    Ok(())
}
