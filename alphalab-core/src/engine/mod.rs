//! Event-driven backtest engine.

pub mod backtest;
pub mod cancel;
pub mod execution;
pub mod portfolio;
pub mod queue;

pub use backtest::{BacktestLoop, LoopState, RunOutput};
pub use cancel::CancelToken;
pub use execution::{
    CommissionConfig, CommissionSchedule, ExecutionSimulator, FillModel, NaiveFill,
    TieredCommission, DEFAULT_VENUE,
};
pub use portfolio::{Portfolio, PortfolioConfig, SizingPolicy};
pub use queue::EventQueue;
