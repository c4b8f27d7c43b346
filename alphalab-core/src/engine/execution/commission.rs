//! Commission schedules: pure functions of fill quantity.
//!
//! The default schedule follows the Interactive Brokers fixed API tier for
//! US stocks (exchange and ECN fees excluded):
//!
//! ```text
//! commission(q) = max(1.30, 0.013 * q)   if q <= 500
//! commission(q) = max(1.30, 0.008 * q)   if q >  500
//! ```

use serde::{Deserialize, Serialize};

use crate::error::KernelError;

/// Commission as a deterministic function of quantity.
///
/// Implementations must be pure: the same quantity always yields the same
/// commission, independent of call order or prior fills.
pub trait CommissionSchedule: Send + Sync {
    fn commission(&self, quantity: u64) -> f64;

    /// Schedule name for manifests and logging.
    fn name(&self) -> &str;
}

/// Two-tier per-share schedule with a per-order minimum.
#[derive(Debug, Clone, PartialEq)]
pub struct TieredCommission {
    pub minimum: f64,
    pub small_rate: f64,
    pub large_rate: f64,
    /// Largest quantity charged at `small_rate`.
    pub tier_break: u64,
}

impl TieredCommission {
    pub fn interactive_brokers() -> Self {
        Self {
            minimum: 1.30,
            small_rate: 0.013,
            large_rate: 0.008,
            tier_break: 500,
        }
    }
}

impl Default for TieredCommission {
    fn default() -> Self {
        Self::interactive_brokers()
    }
}

impl CommissionSchedule for TieredCommission {
    fn commission(&self, quantity: u64) -> f64 {
        let rate = if quantity <= self.tier_break {
            self.small_rate
        } else {
            self.large_rate
        };
        self.minimum.max(rate * quantity as f64)
    }

    fn name(&self) -> &str {
        "ib_tiered"
    }
}

/// Fixed amount per order regardless of size.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatCommission {
    pub amount: f64,
}

impl CommissionSchedule for FlatCommission {
    fn commission(&self, _quantity: u64) -> f64 {
        self.amount
    }

    fn name(&self) -> &str {
        "flat"
    }
}

/// Single per-share rate with a per-order minimum.
#[derive(Debug, Clone, PartialEq)]
pub struct PerShareCommission {
    pub rate: f64,
    pub minimum: f64,
}

impl CommissionSchedule for PerShareCommission {
    fn commission(&self, quantity: u64) -> f64 {
        self.minimum.max(self.rate * quantity as f64)
    }

    fn name(&self) -> &str {
        "per_share"
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ZeroCommission;

impl CommissionSchedule for ZeroCommission {
    fn commission(&self, _quantity: u64) -> f64 {
        0.0
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// Serializable commission selection (venue / fee schedule).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommissionConfig {
    IbTiered,
    Tiered {
        minimum: f64,
        small_rate: f64,
        large_rate: f64,
        tier_break: u64,
    },
    Flat {
        amount: f64,
    },
    PerShare {
        rate: f64,
        #[serde(default)]
        minimum: f64,
    },
    None,
}

impl Default for CommissionConfig {
    fn default() -> Self {
        Self::IbTiered
    }
}

impl CommissionConfig {
    /// Build the schedule, rejecting negative or non-finite parameters.
    pub fn build(&self) -> Result<Box<dyn CommissionSchedule>, KernelError> {
        fn check(name: &str, value: f64) -> Result<(), KernelError> {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(KernelError::Configuration(format!(
                    "commission {name} must be a non-negative number, got {value}"
                )))
            }
        }

        Ok(match self {
            Self::IbTiered => Box::new(TieredCommission::interactive_brokers()),
            Self::Tiered {
                minimum,
                small_rate,
                large_rate,
                tier_break,
            } => {
                check("minimum", *minimum)?;
                check("small_rate", *small_rate)?;
                check("large_rate", *large_rate)?;
                Box::new(TieredCommission {
                    minimum: *minimum,
                    small_rate: *small_rate,
                    large_rate: *large_rate,
                    tier_break: *tier_break,
                })
            }
            Self::Flat { amount } => {
                check("amount", *amount)?;
                Box::new(FlatCommission { amount: *amount })
            }
            Self::PerShare { rate, minimum } => {
                check("rate", *rate)?;
                check("minimum", *minimum)?;
                Box::new(PerShareCommission {
                    rate: *rate,
                    minimum: *minimum,
                })
            }
            Self::None => Box::new(ZeroCommission),
        })
    }
}
