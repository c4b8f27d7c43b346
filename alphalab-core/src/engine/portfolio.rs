//! Portfolio: cash, positions and the equity curve.
//!
//! The portfolio is mutated only by the backtest loop dispatching events to
//! it, in event order. The equity accounting identity holds at every
//! recorded point: `equity == cash + sum(quantity * latest_price)`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    period_return, Bar, EquityPoint, FillEvent, OrderEvent, OrderSide, OrderType, Position,
    SignalDirection, SignalEvent,
};
use crate::engine::execution::CommissionSchedule;
use crate::error::KernelError;

/// How many shares a signal asks for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SizingPolicy {
    /// Always target N shares.
    FixedShares { shares: u64 },
    /// Target `floor(amount / price)` shares.
    FixedNotional { amount: f64 },
    /// Target `floor(fraction * equity / price)` shares.
    PercentEquity { fraction: f64 },
}

impl SizingPolicy {
    /// Target absolute position size at `price` given current `equity`.
    pub fn target_quantity(&self, price: f64, equity: f64) -> u64 {
        if price.is_nan() || price <= 0.0 {
            return 0;
        }
        match self {
            Self::FixedShares { shares } => *shares,
            Self::FixedNotional { amount } => (amount / price).floor().max(0.0) as u64,
            Self::PercentEquity { fraction } => {
                (fraction * equity.max(0.0) / price).floor().max(0.0) as u64
            }
        }
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        let ok = match self {
            Self::FixedShares { shares } => *shares > 0 && *shares <= i64::MAX as u64,
            Self::FixedNotional { amount } => amount.is_finite() && *amount > 0.0,
            Self::PercentEquity { fraction } => fraction.is_finite() && *fraction > 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(KernelError::Configuration(format!(
                "position sizing must be positive: {self:?}"
            )))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    pub sizing: SizingPolicy,
    /// Short signals open short positions. When false they only close longs.
    #[serde(default)]
    pub allow_short: bool,
    /// Buys may take cash below zero.
    #[serde(default)]
    pub allow_margin: bool,
}

impl PortfolioConfig {
    pub fn fixed_shares(shares: u64) -> Self {
        Self {
            sizing: SizingPolicy::FixedShares { shares },
            allow_short: false,
            allow_margin: false,
        }
    }
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self::fixed_shares(100)
    }
}

#[derive(Debug, Clone)]
pub struct Portfolio {
    config: PortfolioConfig,
    initial_cash: f64,
    cash: f64,
    start: DateTime<Utc>,
    positions: BTreeMap<String, Position>,
    latest_prices: BTreeMap<String, f64>,
    equity_curve: Vec<EquityPoint>,
    realized_pnl: f64,
    total_commission: f64,
    /// Cash held for buy orders emitted this tick but not yet filled, by symbol.
    reserved: BTreeMap<String, f64>,
}

impl Portfolio {
    /// `start` stamps the opening equity point; every bar must come after it.
    pub fn new(initial_cash: f64, start: DateTime<Utc>, config: PortfolioConfig) -> Self {
        Self {
            config,
            initial_cash,
            cash: initial_cash,
            start,
            positions: BTreeMap::new(),
            latest_prices: BTreeMap::new(),
            equity_curve: Vec::new(),
            realized_pnl: 0.0,
            total_commission: 0.0,
            reserved: BTreeMap::new(),
        }
    }

    /// Record the bar's close as the latest price and mark the tick's equity point.
    ///
    /// The first bar of a run also writes the opening point at `start`. A bar
    /// with the same timestamp as the latest point re-marks that point, so
    /// replaying an unchanged bar leaves the curve as it was.
    pub fn on_market(&mut self, bar: &Bar) -> Result<(), KernelError> {
        let latest = self
            .equity_curve
            .last()
            .map(|p| p.timestamp)
            .unwrap_or(self.start);
        let same_tick = self.equity_curve.len() > 1 && bar.timestamp == latest;
        if bar.timestamp < latest || (bar.timestamp == latest && !same_tick) {
            return Err(KernelError::OutOfOrderBar {
                symbol: bar.symbol.clone(),
                timestamp: bar.timestamp,
                latest,
            });
        }

        self.latest_prices.insert(bar.symbol.clone(), bar.close);

        if self.equity_curve.is_empty() {
            self.equity_curve
                .push(EquityPoint::opening(self.start, self.initial_cash));
        }

        if same_tick {
            self.remark_latest();
        } else {
            self.reserved.clear();
            let equity = self.total_equity();
            let previous = self
                .equity_curve
                .last()
                .map(|p| p.total_equity)
                .unwrap_or(self.initial_cash);
            self.equity_curve.push(EquityPoint {
                timestamp: bar.timestamp,
                total_equity: equity,
                period_return: period_return(previous, equity),
            });
        }
        Ok(())
    }

    /// Size a signal into an order against the current position.
    ///
    /// Returns `Ok(None)` when the signal would not change the position.
    /// Buys that need more cash than available fail with `InsufficientFunds`
    /// unless margin is allowed. Available cash excludes what earlier buys of
    /// the same tick have reserved; an emitted buy reserves its own cost until
    /// its fill arrives.
    pub fn on_signal(
        &mut self,
        signal: &SignalEvent,
        fees: &dyn CommissionSchedule,
    ) -> Result<Option<OrderEvent>, KernelError> {
        let price = self
            .latest_price(&signal.symbol)
            .ok_or_else(|| KernelError::invalid_order(&signal.symbol, "no market price for symbol"))?;
        let current = self.quantity(&signal.symbol);
        let size = self
            .config
            .sizing
            .target_quantity(price, self.total_equity());
        let size = i64::try_from(size).map_err(|_| {
            KernelError::invalid_order(
                &signal.symbol,
                format!("sized quantity {size} exceeds the position limit"),
            )
        })?;

        let target = match signal.direction {
            SignalDirection::Long if current > 0 => return Ok(None),
            SignalDirection::Long => size,
            SignalDirection::Short if !self.config.allow_short => current.min(0),
            SignalDirection::Short if current < 0 => return Ok(None),
            SignalDirection::Short => -size,
            SignalDirection::Exit => 0,
        };

        let delta = target.checked_sub(current).ok_or_else(|| {
            KernelError::invalid_order(&signal.symbol, "order quantity overflows the position")
        })?;
        if delta == 0 {
            return Ok(None);
        }
        let side = if delta > 0 { OrderSide::Buy } else { OrderSide::Sell };
        let quantity = delta.unsigned_abs();

        if side == OrderSide::Buy && !self.config.allow_margin {
            let required = quantity as f64 * price + fees.commission(quantity);
            let available = self.available_cash();
            if required > available {
                return Err(KernelError::InsufficientFunds {
                    symbol: signal.symbol.clone(),
                    required,
                    available,
                });
            }
            *self.reserved.entry(signal.symbol.clone()).or_insert(0.0) += required;
        }

        debug!(
            symbol = %signal.symbol,
            direction = %signal.direction,
            current,
            target,
            "signal sized"
        );

        Ok(Some(OrderEvent {
            symbol: signal.symbol.clone(),
            order_type: OrderType::Market,
            quantity,
            side,
        }))
    }

    /// Apply a fill to cash and the position.
    ///
    /// Only the open tick's equity point is re-marked; earlier points are
    /// never revised.
    pub fn on_fill(&mut self, fill: &FillEvent) -> Result<(), KernelError> {
        if fill.quantity == 0 {
            return Err(KernelError::invalid_order(&fill.symbol, "fill quantity must be positive"));
        }

        self.cash += fill.cash_delta();
        self.total_commission += fill.commission;
        if fill.side == OrderSide::Buy {
            self.reserved.remove(&fill.symbol);
        }

        let position = self
            .positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::flat(&fill.symbol));
        self.realized_pnl += position.apply_fill(fill.side, fill.quantity, fill.fill_cost);
        if position.is_flat() {
            self.positions.remove(&fill.symbol);
        }
        self.latest_prices
            .entry(fill.symbol.clone())
            .or_insert(fill.fill_cost);

        let open_tick = self.equity_curve.len() > 1
            && self
                .equity_curve
                .last()
                .is_some_and(|p| p.timestamp == fill.timestamp);
        if open_tick {
            self.remark_latest();
        }
        Ok(())
    }

    fn remark_latest(&mut self) {
        let equity = self.total_equity();
        let n = self.equity_curve.len();
        let previous = if n >= 2 {
            self.equity_curve[n - 2].total_equity
        } else {
            self.initial_cash
        };
        if let Some(last) = self.equity_curve.last_mut() {
            last.total_equity = equity;
            last.period_return = period_return(previous, equity);
        }
    }

    /// Cash plus every position marked at its latest price.
    pub fn total_equity(&self) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = self
                    .latest_prices
                    .get(&pos.symbol)
                    .copied()
                    .unwrap_or(pos.average_cost);
                pos.market_value(price)
            })
            .sum();
        self.cash + position_value
    }

    /// Check the accounting identity for the latest point.
    pub fn verify_equity(&self) -> bool {
        match self.equity_curve.last() {
            Some(point) if self.equity_curve.len() > 1 => {
                (point.total_equity - self.total_equity()).abs() <= 1e-6 * point.total_equity.abs().max(1.0)
            }
            _ => true,
        }
    }

    pub fn quantity(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).map_or(0, |p| p.quantity)
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn latest_price(&self, symbol: &str) -> Option<f64> {
        self.latest_prices.get(symbol).copied()
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Cash not yet committed to pending buy orders.
    pub fn available_cash(&self) -> f64 {
        self.cash - self.reserved.values().sum::<f64>()
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn total_commission(&self) -> f64 {
        self.total_commission
    }

    pub fn config(&self) -> &PortfolioConfig {
        &self.config
    }
}
