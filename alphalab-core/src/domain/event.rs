//! Events flowing through the kernel's single ordered channel.
//!
//! The set is closed: Market, Signal, Order, Fill. Every dispatch site matches
//! exhaustively, so adding a variant breaks the build at each stage that has
//! to handle it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Directional trading intent produced from a strategy score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalDirection {
    Long,
    Short,
    Exit,
}

impl fmt::Display for SignalDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
            Self::Exit => write!(f, "EXIT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells.
    pub fn sign(&self) -> i64 {
        match self {
            Self::Buy => 1,
            Self::Sell => -1,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit { limit_price: f64 },
}

/// A directional signal for one symbol at one bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub direction: SignalDirection,
}

/// A sized order awaiting execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub symbol: String,
    pub order_type: OrderType,
    pub quantity: u64,
    pub side: OrderSide,
}

impl fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order: Symbol={}, Type={:?}, Quantity={}, Direction={}",
            self.symbol, self.order_type, self.quantity, self.side
        )
    }
}

/// Simulated execution of exactly one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillEvent {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub venue: String,
    pub quantity: u64,
    pub side: OrderSide,
    /// Price per unit.
    pub fill_cost: f64,
    pub commission: f64,
}

impl FillEvent {
    /// Unsigned traded value, `quantity * fill_cost`.
    pub fn notional(&self) -> f64 {
        self.quantity as f64 * self.fill_cost
    }

    /// Change in cash caused by this fill, commission included.
    pub fn cash_delta(&self) -> f64 {
        match self.side {
            OrderSide::Buy => -self.notional() - self.commission,
            OrderSide::Sell => self.notional() - self.commission,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// A new bar is available for `symbol`; the timestamp is the feed's latest bar.
    Market { symbol: String },
    Signal(SignalEvent),
    Order(OrderEvent),
    Fill(FillEvent),
}

impl Event {
    pub fn market(symbol: impl Into<String>) -> Self {
        Self::Market {
            symbol: symbol.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Market { .. } => "MARKET",
            Self::Signal(_) => "SIGNAL",
            Self::Order(_) => "ORDER",
            Self::Fill(_) => "FILL",
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Self::Market { symbol } => symbol,
            Self::Signal(s) => &s.symbol,
            Self::Order(o) => &o.symbol,
            Self::Fill(f) => &f.symbol,
        }
    }
}
