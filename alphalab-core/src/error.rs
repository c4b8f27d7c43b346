//! Kernel error taxonomy.
//!
//! Exhaustion of the data source is not an error: the feed reports it by
//! returning `None` from `advance()` and the loop moves to `Finished`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KernelError {
    #[error("insufficient funds for {symbol}: need {required:.2}, have {available:.2}")]
    InsufficientFunds {
        symbol: String,
        required: f64,
        available: f64,
    },

    #[error("scoring failed for {symbol}: {reason}")]
    ScoringFailure { symbol: String, reason: String },

    #[error("invalid order for '{symbol}': {reason}")]
    InvalidOrder { symbol: String, reason: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("bar for {symbol} at {timestamp} is not after the latest recorded point {latest}")]
    OutOfOrderBar {
        symbol: String,
        timestamp: DateTime<Utc>,
        latest: DateTime<Utc>,
    },
}

impl KernelError {
    pub fn invalid_order(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOrder {
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// Fatal errors halt the run; the rest are absorbed at the tick they occur.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::InsufficientFunds { .. } | Self::ScoringFailure { .. }
        )
    }

    /// Classification for recovered errors, `None` for fatal ones.
    pub fn recovered_kind(&self) -> Option<RecoveredKind> {
        match self {
            Self::InsufficientFunds { .. } => Some(RecoveredKind::InsufficientFunds),
            Self::ScoringFailure { .. } => Some(RecoveredKind::ScoringFailure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveredKind {
    ScoringFailure,
    InsufficientFunds,
}

/// A recoverable condition absorbed during the run, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveredError {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub kind: RecoveredKind,
    pub detail: String,
}
