use crate::{
    config::Config,
    exchange::{Fill, MarketData, OrderExecution},
    exit::JudgeExitEvaluator,
    orchestrator::{Orchestrator, Signal},
};
use chrono::{DateTime, TimeDelta, Utc};
use fnv::FnvHashMap;
use itertools::Itertools;
use scalper_instrument::Symbol;
use scalper_judge::{JudgeClient, JudgeGateway};
use scalper_memory::{MemorySystem, TradeContext, TradeExit, TradeMemory};
use scalper_risk::{
    DailyRisk, ExitAction, ExitConfig, ExitReason, Position, PositionSizer, RiskLimits, update,
};
use scalper_ta::compute;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Agent loop cadence.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Sleep between ticks of [`Agent::run`].
    pub tick_interval_ms: u64,
    pub scan_interval_secs: i64,
    pub sync_interval_secs: i64,
    pub status_interval_secs: i64,
    /// Candles requested per kline fetch.
    pub kline_limit: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 5_000,
            scan_interval_secs: 60,
            sync_interval_secs: 300,
            status_interval_secs: 60,
            kline_limit: 100,
        }
    }
}

/// Lifetime activity counters of an [`Agent`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Deserialize, Serialize)]
pub struct AgentCounters {
    pub ticks: u64,
    pub scans: u64,
    pub signals: u64,
    pub rejections: u64,
    pub opened: u64,
    pub partials: u64,
    pub closed: u64,
    pub errors: u64,
}

/// Position together with the entry context written back to memory once it closes.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub position: Position,
    pub context: TradeContext,
}

#[derive(Debug, Default)]
struct Schedule {
    last_scan: Option<DateTime<Utc>>,
    last_sync: Option<DateTime<Utc>>,
    last_status: Option<DateTime<Utc>>,
}

fn is_due(last: &mut Option<DateTime<Utc>>, interval_secs: i64, now: DateTime<Utc>) -> bool {
    let due = last.is_none_or(|last| now - last >= TimeDelta::seconds(interval_secs));
    if due {
        *last = Some(now);
    }
    due
}

/// Single trading agent: one logical loop owning its positions, counters, orchestrator and
/// memory.
#[derive(Debug)]
pub struct Agent<Market, Execution, Client> {
    config: AgentConfig,
    symbols: Vec<Symbol>,
    market: Market,
    execution: Execution,
    orchestrator: Orchestrator<Client>,
    judge_exit: JudgeExitEvaluator,
    memory: MemorySystem,
    exit: ExitConfig,
    sizer: PositionSizer,
    limits: RiskLimits,
    daily: DailyRisk,
    positions: FnvHashMap<Symbol, OpenPosition>,
    counters: AgentCounters,
    schedule: Schedule,
}

impl<Market, Execution, Client> Agent<Market, Execution, Client>
where
    Market: MarketData,
    Execution: OrderExecution,
    Client: JudgeClient,
{
    pub fn new(
        config: &Config,
        market: Market,
        execution: Execution,
        judge: Option<JudgeGateway<Client>>,
        memory: MemorySystem,
    ) -> Self {
        Self {
            config: config.agent.clone(),
            symbols: config.symbols.clone(),
            market,
            execution,
            orchestrator: Orchestrator::new(
                config.orchestrator.clone(),
                config.indicators,
                config.strategy,
                judge,
            ),
            judge_exit: JudgeExitEvaluator::new(config.judge_exit),
            memory,
            exit: config.exit.clone(),
            sizer: config.sizing,
            limits: config.limits,
            daily: DailyRisk::default(),
            positions: FnvHashMap::default(),
            counters: AgentCounters::default(),
            schedule: Schedule::default(),
        }
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn execution(&self) -> &Execution {
        &self.execution
    }

    pub fn memory(&self) -> &MemorySystem {
        &self.memory
    }

    pub fn counters(&self) -> AgentCounters {
        self.counters
    }

    pub fn daily_risk(&self) -> &DailyRisk {
        &self.daily
    }

    pub fn position(&self, symbol: &Symbol) -> Option<&OpenPosition> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &OpenPosition> {
        self.positions.values()
    }

    /// One pass of the agent loop: monitor positions, periodic sync, risk check, periodic
    /// scan and status.
    pub async fn tick(&mut self, now: DateTime<Utc>) {
        self.counters.ticks += 1;

        self.monitor(now).await;

        if is_due(&mut self.schedule.last_sync, self.config.sync_interval_secs, now) {
            self.sync(now);
        }

        match self.daily.check(self.positions.len(), &self.limits, now) {
            Ok(()) => {
                if is_due(&mut self.schedule.last_scan, self.config.scan_interval_secs, now) {
                    self.scan(now).await;
                }
            }
            Err(violation) => debug!(%violation, "entries paused"),
        }

        if is_due(&mut self.schedule.last_status, self.config.status_interval_secs, now) {
            self.status();
        }
    }

    /// Tick every `tick_interval_ms` until `shutdown` resolves, then save memory.
    pub async fn run<Shutdown>(mut self, shutdown: Shutdown) -> AgentCounters
    where
        Shutdown: Future<Output = ()>,
    {
        let mut interval =
            tokio::time::interval(Duration::from_millis(self.config.tick_interval_ms.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(symbols = ?self.symbols, "agent started");
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => self.tick(Utc::now()).await,
            }
        }

        self.shutdown()
    }

    /// Save memory before the agent is dropped.
    pub fn shutdown(&mut self) -> AgentCounters {
        info!(
            open = self.positions.len(),
            closed = self.counters.closed,
            "agent stopping"
        );
        self.memory.shutdown();
        self.counters
    }

    async fn monitor(&mut self, now: DateTime<Utc>) {
        let symbols = self.positions.keys().cloned().sorted().collect::<Vec<_>>();

        for symbol in symbols {
            let price = match self.market.price(&symbol).await {
                Ok(price) => price,
                Err(error) => {
                    warn!(%symbol, %error, "failed to fetch price for open position");
                    self.counters.errors += 1;
                    continue;
                }
            };

            let Some(open) = self.positions.get_mut(&symbol) else {
                continue;
            };
            let next = update(&open.position, price, now, &self.exit);
            open.position = next.position;

            match (next.action, next.reason) {
                (ExitAction::PartialClose { size }, Some(reason)) => {
                    self.partial_close(&symbol, size, reason, now).await
                }
                (ExitAction::Close, Some(reason)) => self.close(&symbol, reason, now).await,
                _ => self.judge_exit(&symbol, now).await,
            }
        }
    }

    async fn judge_exit(&mut self, symbol: &Symbol, now: DateTime<Utc>) {
        let Some(judge) = self.orchestrator.judge() else {
            return;
        };
        let Some(open) = self.positions.get(symbol) else {
            return;
        };
        if !self.judge_exit.is_due(&open.position, now) {
            return;
        }

        let snapshot = match self.market.klines(symbol, self.config.kline_limit).await {
            Ok(candles) => compute(&candles, self.orchestrator.indicators()),
            Err(error) => {
                debug!(%symbol, %error, "judge exit check without indicators");
                None
            }
        };

        let position = open.position.clone();
        let reason = self.judge_exit.evaluate(judge, &position, snapshot, now).await;
        if let Some(reason) = reason {
            self.close(symbol, reason, now).await;
        }
    }

    async fn partial_close(&mut self, symbol: &Symbol, size: f64, reason: ExitReason, now: DateTime<Utc>) {
        let Some(side) = self.positions.get(symbol).map(|open| open.position.side) else {
            return;
        };

        let fill = match self.execution.close(symbol, side, size).await {
            Ok(fill) => fill,
            Err(error) => {
                warn!(%symbol, %reason, %error, "partial close failed");
                self.counters.errors += 1;
                return;
            }
        };

        if let Some(open) = self.positions.get_mut(symbol) {
            let banked = open.position.reduce(fill.quantity, fill.price);
            self.counters.partials += 1;
            info!(
                %symbol,
                %reason,
                price = fill.price,
                quantity = fill.quantity,
                remaining = open.position.size,
                banked,
                "position partially closed"
            );
            self.memory
                .record_event(symbol.clone(), format!("{reason} banked {banked:.2}"), now);
        }
    }

    async fn close(&mut self, symbol: &Symbol, reason: ExitReason, now: DateTime<Utc>) {
        let Some((side, size)) = self
            .positions
            .get(symbol)
            .map(|open| (open.position.side, open.position.size))
        else {
            return;
        };

        let fill = match self.execution.close(symbol, side, size).await {
            Ok(fill) => fill,
            Err(error) => {
                warn!(%symbol, %reason, %error, "close failed");
                self.counters.errors += 1;
                return;
            }
        };

        let Some(open) = self.positions.remove(symbol) else {
            return;
        };
        self.judge_exit.remove(symbol);
        self.finish(open, &fill, reason, now);
    }

    fn finish(&mut self, open: OpenPosition, fill: &Fill, reason: ExitReason, now: DateTime<Utc>) {
        let realised_pnl = open.position.total_pnl_at(fill.price);
        let realised_roe = open.position.total_roe_at(fill.price);

        info!(
            symbol = %fill.symbol,
            side = %open.position.side,
            %reason,
            entry = open.position.entry_price,
            exit = fill.price,
            pnl = realised_pnl,
            roe = realised_roe,
            highest_roe = open.position.highest_roe,
            "position closed"
        );

        self.counters.closed += 1;
        self.daily.record(realised_pnl, now);
        self.memory.record_trade(TradeMemory::new(
            open.context,
            TradeExit {
                exit_price: fill.price,
                exit_time: now,
                realised_pnl,
                realised_roe,
                exit_reason: reason.to_string(),
            },
        ));
    }

    async fn scan(&mut self, now: DateTime<Utc>) {
        self.counters.scans += 1;
        let ranked = self.memory.rank_symbols(self.symbols.iter());

        for (symbol, priority) in ranked {
            if self.positions.contains_key(&symbol) {
                continue;
            }
            if let Err(violation) = self.daily.check(self.positions.len(), &self.limits, now) {
                debug!(%violation, "scan stopped");
                break;
            }

            let candles = match self.market.klines(&symbol, self.config.kline_limit).await {
                Ok(candles) => candles,
                Err(error) => {
                    warn!(%symbol, %error, "failed to fetch klines");
                    self.counters.errors += 1;
                    continue;
                }
            };

            match self
                .orchestrator
                .evaluate(&mut self.memory, &symbol, &candles, now)
                .await
            {
                Ok(signal) => {
                    self.counters.signals += 1;
                    self.open(signal, now).await;
                }
                Err(rejection) => {
                    self.counters.rejections += 1;
                    debug!(%symbol, priority, %rejection, "entry rejected");
                }
            }
        }
    }

    async fn open(&mut self, signal: Signal, now: DateTime<Utc>) {
        let margin = self.sizer.margin(signal.confidence, signal.multipliers.size);
        let quantity = self.sizer.quantity(margin, signal.indicators.price);

        let fill = match self.execution.open(&signal.symbol, signal.side, quantity).await {
            Ok(fill) => fill,
            Err(error) => {
                warn!(symbol = %signal.symbol, %error, "entry order failed");
                self.counters.errors += 1;
                return;
            }
        };

        let position = Position::open(
            signal.symbol.clone(),
            signal.side,
            fill.price,
            fill.quantity,
            self.sizer.leverage,
            now,
        )
        .with_entry(Some(signal.indicators), signal.score)
        .with_targets(
            Some(self.exit.take_profit_roe * signal.multipliers.target),
            Some(self.exit.stop_loss_roe * signal.multipliers.stop),
        );

        let context = TradeContext {
            symbol: signal.symbol.clone(),
            side: signal.side,
            entry_price: fill.price,
            entry_time: now,
            leverage: self.sizer.leverage,
            entry_snapshot: Some(signal.indicators),
            entry_score: signal.score,
            confidence: signal.confidence,
            combo_tag: signal.combo_tag,
            regime: Some(signal.regime),
            judge_agreed: signal.judge_agreed,
        };

        info!(
            symbol = %signal.symbol,
            side = %signal.side,
            price = fill.price,
            quantity = fill.quantity,
            margin = position.margin_used,
            confidence = signal.confidence,
            take_profit = ?position.dynamic_take_profit,
            stop_loss = ?position.dynamic_stop_loss,
            "position opened"
        );
        self.counters.opened += 1;
        self.positions
            .insert(signal.symbol, OpenPosition { position, context });
    }

    fn sync(&self, now: DateTime<Utc>) {
        for open in self.positions.values() {
            let position = &open.position;
            info!(
                symbol = %position.symbol,
                side = %position.side,
                size = position.size,
                entry = position.entry_price,
                price = position.current_price,
                roe = position.unrealised_roe,
                highest_roe = position.highest_roe,
                held_secs = position.held(now).num_seconds(),
                "position sync"
            );
        }
    }

    fn status(&self) {
        let stats = self.memory.stats();
        info!(
            open = self.positions.len(),
            daily_pnl = self.daily.realised_pnl,
            trades = stats.total,
            win_rate = stats.win_rate,
            regimes = self.memory.regimes().len(),
            ticks = self.counters.ticks,
            signals = self.counters.signals,
            rejections = self.counters.rejections,
            errors = self.counters.errors,
            "agent status"
        );
    }
}
