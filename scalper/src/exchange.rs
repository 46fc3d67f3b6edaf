use crate::error::ExchangeError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use parking_lot::Mutex;
use scalper_instrument::{Candle, Side, Symbol};
use serde::{Deserialize, Serialize};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};
use tracing::debug;

/// Market data capability the decision engine depends on.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Latest traded price of `symbol`.
    async fn price(&self, symbol: &Symbol) -> Result<f64, ExchangeError>;

    /// Most recent `limit` closed candles of `symbol`, oldest first.
    async fn klines(&self, symbol: &Symbol, limit: usize) -> Result<Vec<Candle>, ExchangeError>;
}

#[async_trait]
impl<Market> MarketData for Arc<Market>
where
    Market: MarketData + ?Sized,
{
    async fn price(&self, symbol: &Symbol) -> Result<f64, ExchangeError> {
        self.as_ref().price(symbol).await
    }

    async fn klines(&self, symbol: &Symbol, limit: usize) -> Result<Vec<Candle>, ExchangeError> {
        self.as_ref().klines(symbol, limit).await
    }
}

/// Executed market order.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Fill {
    pub symbol: Symbol,
    /// Side of the position the order opened or reduced.
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    /// Whether the order reduced an existing position.
    pub reduce_only: bool,
}

/// Order placement capability the agent depends on.
#[async_trait]
pub trait OrderExecution: Send + Sync {
    /// Open (or add to) a `side` position of `quantity` at market.
    async fn open(&self, symbol: &Symbol, side: Side, quantity: f64) -> Result<Fill, ExchangeError>;

    /// Reduce a `side` position by `quantity` at market.
    async fn close(&self, symbol: &Symbol, side: Side, quantity: f64) -> Result<Fill, ExchangeError>;
}

/// In-memory candle replay.
///
/// Each symbol's series is exposed up to a shared cursor, which [`HistoricalMarketData::advance`]
/// moves forward one bar at a time. The latest exposed close is the current price.
#[derive(Debug)]
pub struct HistoricalMarketData {
    series: FnvHashMap<Symbol, Vec<Candle>>,
    cursor: AtomicUsize,
    len: usize,
}

impl HistoricalMarketData {
    /// Replay starting with the first `warmup` bars of every series visible.
    pub fn new(series: FnvHashMap<Symbol, Vec<Candle>>, warmup: usize) -> Self {
        let len = series.values().map(Vec::len).min().unwrap_or_default();
        Self {
            series,
            cursor: AtomicUsize::new(warmup.clamp(1, len.max(1)) - 1),
            len,
        }
    }

    pub fn symbols(&self) -> impl Iterator<Item = &Symbol> {
        self.series.keys()
    }

    /// Expose the next bar. Returns false once every bar has been replayed.
    pub fn advance(&self) -> bool {
        let next = self.cursor.load(Ordering::Acquire) + 1;
        if next >= self.len {
            return false;
        }
        self.cursor.store(next, Ordering::Release);
        true
    }

    /// Close time of the latest exposed bar.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        let cursor = self.cursor.load(Ordering::Acquire);
        self.series
            .values()
            .filter_map(|candles| candles.get(cursor))
            .map(|candle| candle.close_time)
            .max()
    }

    fn visible(&self, symbol: &Symbol) -> Result<&[Candle], ExchangeError> {
        let candles = self
            .series
            .get(symbol)
            .ok_or_else(|| ExchangeError::UnknownSymbol(symbol.clone()))?;
        let end = (self.cursor.load(Ordering::Acquire) + 1).min(candles.len());
        if end == 0 {
            return Err(ExchangeError::NoData(symbol.clone()));
        }
        Ok(&candles[..end])
    }
}

#[async_trait]
impl MarketData for HistoricalMarketData {
    async fn price(&self, symbol: &Symbol) -> Result<f64, ExchangeError> {
        self.visible(symbol)?
            .last()
            .map(|candle| candle.close)
            .ok_or_else(|| ExchangeError::NoData(symbol.clone()))
    }

    async fn klines(&self, symbol: &Symbol, limit: usize) -> Result<Vec<Candle>, ExchangeError> {
        let visible = self.visible(symbol)?;
        Ok(visible[visible.len().saturating_sub(limit)..].to_vec())
    }
}

/// Paper trading [`OrderExecution`] filling every order at the current market price, adjusted
/// by `slippage_bps` against the trader.
#[derive(Debug)]
pub struct PaperExecution<Market> {
    market: Market,
    slippage_bps: f64,
    fills: Mutex<Vec<Fill>>,
}

impl<Market> PaperExecution<Market>
where
    Market: MarketData,
{
    pub fn new(market: Market, slippage_bps: f64) -> Self {
        Self {
            market,
            slippage_bps,
            fills: Mutex::new(Vec::new()),
        }
    }

    /// Every fill generated so far, oldest first.
    pub fn fills(&self) -> Vec<Fill> {
        self.fills.lock().clone()
    }

    async fn fill(
        &self,
        symbol: &Symbol,
        side: Side,
        quantity: f64,
        reduce_only: bool,
    ) -> Result<Fill, ExchangeError> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(ExchangeError::InvalidQuantity {
                symbol: symbol.clone(),
                quantity,
            });
        }

        let market_price = self.market.price(symbol).await?;

        // Buying pays up, selling gives up
        let buying = matches!((side, reduce_only), (Side::Long, false) | (Side::Short, true));
        let slippage = market_price * self.slippage_bps / 10_000.0;
        let price = if buying {
            market_price + slippage
        } else {
            market_price - slippage
        };

        let fill = Fill {
            symbol: symbol.clone(),
            side,
            price,
            quantity,
            reduce_only,
        };
        debug!(%symbol, %side, price, quantity, reduce_only, "paper fill");
        self.fills.lock().push(fill.clone());
        Ok(fill)
    }
}

#[async_trait]
impl<Market> OrderExecution for PaperExecution<Market>
where
    Market: MarketData,
{
    async fn open(&self, symbol: &Symbol, side: Side, quantity: f64) -> Result<Fill, ExchangeError> {
        self.fill(symbol, side, quantity, false).await
    }

    async fn close(&self, symbol: &Symbol, side: Side, quantity: f64) -> Result<Fill, ExchangeError> {
        self.fill(symbol, side, quantity, true).await
    }
}
