//! Execution simulator: turns orders into fills.
//!
//! The default fill model is naive: the whole order fills
//! immediately at the last known close, with no slippage, no latency and no
//! partial fills. It is a first-pass approximation, not a market model.
//! Alternative fill models and fee schedules plug in through `FillModel` and
//! `CommissionSchedule` without touching the portfolio or the loop.

pub mod commission;

pub use commission::{
    CommissionConfig, CommissionSchedule, FlatCommission, PerShareCommission, TieredCommission,
    ZeroCommission,
};

use tracing::debug;

use crate::data::MarketDataFeed;
use crate::domain::{Bar, FillEvent, OrderEvent, OrderSide, OrderType};
use crate::error::KernelError;

/// Default venue stamped on simulated fills.
pub const DEFAULT_VENUE: &str = "ARCA";

/// Price at which an order fills against the current bar.
pub trait FillModel: Send + Sync {
    /// Fill price per unit, or `InvalidOrder` if the order cannot fill.
    fn fill_price(&self, order: &OrderEvent, bar: &Bar) -> Result<f64, KernelError>;

    fn name(&self) -> &str;
}

/// Immediate fill at the bar close.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaiveFill;

impl FillModel for NaiveFill {
    fn fill_price(&self, order: &OrderEvent, bar: &Bar) -> Result<f64, KernelError> {
        let last = bar.close;
        match order.order_type {
            OrderType::Market => Ok(last),
            OrderType::Limit { limit_price } => {
                let marketable = match order.side {
                    OrderSide::Buy => last <= limit_price,
                    OrderSide::Sell => last >= limit_price,
                };
                if marketable {
                    Ok(last)
                } else {
                    // No resting orders: a limit that cannot fill now never will.
                    Err(KernelError::invalid_order(
                        &order.symbol,
                        format!("limit {limit_price} not marketable at last price {last}"),
                    ))
                }
            }
        }
    }

    fn name(&self) -> &str {
        "naive_close"
    }
}

/// Converts `OrderEvent`s into `FillEvent`s.
pub struct ExecutionSimulator {
    fill_model: Box<dyn FillModel>,
    commission: Box<dyn CommissionSchedule>,
    venue: String,
}

impl ExecutionSimulator {
    pub fn new(
        fill_model: Box<dyn FillModel>,
        commission: Box<dyn CommissionSchedule>,
        venue: impl Into<String>,
    ) -> Self {
        Self {
            fill_model,
            commission,
            venue: venue.into(),
        }
    }

    /// Naive fills, Interactive Brokers tiered commission, `ARCA` venue.
    pub fn naive() -> Self {
        Self::new(
            Box::new(NaiveFill),
            Box::new(TieredCommission::interactive_brokers()),
            DEFAULT_VENUE,
        )
    }

    pub fn from_config(config: &CommissionConfig, venue: &str) -> Result<Self, KernelError> {
        Ok(Self::new(Box::new(NaiveFill), config.build()?, venue))
    }

    pub fn commission_schedule(&self) -> &dyn CommissionSchedule {
        self.commission.as_ref()
    }

    pub fn venue(&self) -> &str {
        &self.venue
    }

    /// Fill the entire order against the feed's latest bar for its symbol.
    pub fn execute(
        &self,
        order: &OrderEvent,
        feed: &dyn MarketDataFeed,
    ) -> Result<FillEvent, KernelError> {
        if order.quantity == 0 {
            return Err(KernelError::invalid_order(&order.symbol, "quantity must be positive"));
        }
        let bar = feed
            .latest_bar(&order.symbol)
            .ok_or_else(|| KernelError::invalid_order(&order.symbol, "no market data for symbol"))?;

        let fill_cost = self.fill_model.fill_price(order, bar)?;
        let commission = self.commission.commission(order.quantity);

        debug!(
            symbol = %order.symbol,
            side = %order.side,
            quantity = order.quantity,
            fill_cost,
            commission,
            "order filled"
        );

        Ok(FillEvent {
            timestamp: bar.timestamp,
            symbol: order.symbol.clone(),
            venue: self.venue.clone(),
            quantity: order.quantity,
            side: order.side,
            fill_cost,
            commission,
        })
    }
}

impl Default for ExecutionSimulator {
    fn default() -> Self {
        Self::naive()
    }
}

impl std::fmt::Debug for ExecutionSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionSimulator")
            .field("fill_model", &self.fill_model.name())
            .field("commission", &self.commission.name())
            .field("venue", &self.venue)
            .finish()
    }
}
