//! Domain types for AlphaLab

pub mod bar;
pub mod equity;
pub mod event;
pub mod position;

pub use bar::Bar;
pub use equity::{period_return, EquityPoint};
pub use event::{Event, FillEvent, OrderEvent, OrderSide, OrderType, SignalDirection, SignalEvent};
pub use position::Position;
