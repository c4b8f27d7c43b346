use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One point of the equity curve: total portfolio value at a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub total_equity: f64,
    /// `total_equity / previous_total_equity - 1`; zero for the opening point.
    pub period_return: f64,
}

impl EquityPoint {
    pub fn opening(timestamp: DateTime<Utc>, equity: f64) -> Self {
        Self {
            timestamp,
            total_equity: equity,
            period_return: 0.0,
        }
    }
}

/// Period return between two equity levels; zero when `previous` is not positive.
pub fn period_return(previous: f64, current: f64) -> f64 {
    if previous > 0.0 {
        current / previous - 1.0
    } else {
        0.0
    }
}
