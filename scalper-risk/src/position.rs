use chrono::{DateTime, TimeDelta, Utc};
use scalper_instrument::{Side, Symbol};
use scalper_ta::IndicatorSnapshot;
use serde::{Deserialize, Serialize};

/// Lowest leverage a [`Position`] is opened with. Lower or non-finite values are treated as
/// unlevered.
pub const MIN_LEVERAGE: f64 = 1.0;

fn effective_leverage(leverage: f64) -> f64 {
    if leverage.is_finite() && leverage >= MIN_LEVERAGE {
        leverage
    } else {
        MIN_LEVERAGE
    }
}

/// Trailing stop state, expressed as an ROE (%) level.
#[derive(Debug, Copy, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct TrailingStop {
    pub active: bool,
    /// Exit once ROE falls to or below this level. Only ever ratchets upwards.
    pub stop_roe: f64,
}

/// Open leveraged position on one symbol.
///
/// ROE values are percentages of the margin used, eg/ `1.5` is +1.5%.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Position {
    pub symbol: Symbol,
    pub side: Side,
    /// Remaining quantity.
    pub size: f64,
    pub original_size: f64,
    pub entry_price: f64,
    pub current_price: f64,
    pub leverage: f64,
    /// Margin backing the remaining quantity.
    pub margin_used: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub opened_at: DateTime<Utc>,
    pub unrealised_pnl: f64,
    pub unrealised_roe: f64,
    /// Monotonic ratchet of the best ROE seen.
    pub highest_roe: f64,
    /// Monotonic ratchet of the worst ROE seen.
    pub lowest_roe: f64,
    /// Pnl banked by partial closes.
    pub realised_pnl: f64,
    pub partial_taken: bool,
    pub profit_lock_armed: bool,
    pub break_even_armed: bool,
    pub trailing: TrailingStop,
    /// Take profit ROE overriding the configured one, eg/ scaled by the market regime.
    pub dynamic_take_profit: Option<f64>,
    /// Stop loss ROE overriding the configured one.
    pub dynamic_stop_loss: Option<f64>,
    pub entry_snapshot: Option<IndicatorSnapshot>,
    pub entry_score: f64,
}

impl Position {
    pub fn open(
        symbol: Symbol,
        side: Side,
        entry_price: f64,
        size: f64,
        leverage: f64,
        opened_at: DateTime<Utc>,
    ) -> Self {
        let leverage = effective_leverage(leverage);
        Self {
            symbol,
            side,
            size,
            original_size: size,
            entry_price,
            current_price: entry_price,
            leverage,
            margin_used: entry_price * size / leverage,
            opened_at,
            unrealised_pnl: 0.0,
            unrealised_roe: 0.0,
            highest_roe: 0.0,
            lowest_roe: 0.0,
            realised_pnl: 0.0,
            partial_taken: false,
            profit_lock_armed: false,
            break_even_armed: false,
            trailing: TrailingStop::default(),
            dynamic_take_profit: None,
            dynamic_stop_loss: None,
            entry_snapshot: None,
            entry_score: 0.0,
        }
    }

    pub fn with_entry(mut self, snapshot: Option<IndicatorSnapshot>, score: f64) -> Self {
        self.entry_snapshot = snapshot;
        self.entry_score = score;
        self
    }

    pub fn with_targets(mut self, take_profit_roe: Option<f64>, stop_loss_roe: Option<f64>) -> Self {
        self.dynamic_take_profit = take_profit_roe;
        self.dynamic_stop_loss = stop_loss_roe;
        self
    }

    /// Pnl of the remaining quantity at `price`.
    pub fn pnl_at(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.side.sign() * self.size
    }

    /// ROE (%) of the remaining quantity at `price`.
    pub fn roe_at(&self, price: f64) -> f64 {
        if self.margin_used <= 0.0 {
            return 0.0;
        }
        self.pnl_at(price) / self.margin_used * 100.0
    }

    pub fn held(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.opened_at
    }

    /// Margin originally committed, before any partial close.
    pub fn original_margin(&self) -> f64 {
        self.entry_price * self.original_size / effective_leverage(self.leverage)
    }

    /// Close `quantity` at `price`, banking its pnl. Returns the pnl realised.
    pub fn reduce(&mut self, quantity: f64, price: f64) -> f64 {
        let quantity = quantity.clamp(0.0, self.size);
        let pnl = (price - self.entry_price) * self.side.sign() * quantity;

        if self.size > 0.0 {
            self.margin_used *= (self.size - quantity) / self.size;
        }
        self.size -= quantity;
        self.realised_pnl += pnl;
        self.partial_taken = true;
        self.current_price = price;
        self.unrealised_pnl = self.pnl_at(price);
        pnl
    }

    /// Total pnl if the remaining quantity is closed at `price`, including partial closes.
    pub fn total_pnl_at(&self, price: f64) -> f64 {
        self.realised_pnl + self.pnl_at(price)
    }

    /// Total ROE (%) on the original margin if closed at `price`.
    pub fn total_roe_at(&self, price: f64) -> f64 {
        let margin = self.original_margin();
        if margin <= 0.0 {
            return 0.0;
        }
        self.total_pnl_at(price) / margin * 100.0
    }
}
