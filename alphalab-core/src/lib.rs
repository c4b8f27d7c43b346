//! AlphaLab Core: deterministic discrete-event backtesting kernel.
//!
//! This crate contains:
//! - Domain types (bars, the four event kinds, positions, equity points)
//! - FIFO event queue and the single-threaded backtest loop
//! - Portfolio accounting (cash, positions, equity curve, sizing)
//! - Naive execution simulator with pluggable fill and commission models
//! - Performance analyzer (total return, Sharpe, drawdown)
//! - Market data feed and strategy (scoring) seams

pub mod analysis;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod signals;

pub use error::{KernelError, RecoveredError, RecoveredKind};
