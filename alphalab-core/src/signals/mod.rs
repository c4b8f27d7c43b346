//! Strategy seam: per-symbol scores turned into directional signals.
//!
//! A strategy sees only the bar history the feed has delivered so far for
//! one symbol. It never sees portfolio state. Its output is either a numeric
//! score, mapped through `ScoreThresholds`, or an explicit direction.

pub mod mean_reversion;
pub mod momentum;
pub mod score_series;

pub use mean_reversion::MeanReversion;
pub use momentum::Momentum;
pub use score_series::ScoreSeries;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Bar, SignalDirection};
use crate::error::KernelError;

/// Output of a strategy for one symbol at one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    Value(f64),
    Directive(SignalDirection),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("score is not a finite number: {0}")]
    NonFinite(f64),

    #[error("{0}")]
    Failed(String),
}

impl ScoringError {
    pub fn into_kernel(self, symbol: &str) -> KernelError {
        KernelError::ScoringFailure {
            symbol: symbol.to_string(),
            reason: self.to_string(),
        }
    }
}

/// Scoring function evaluated once per symbol per tick.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Score `symbol` given its bars up to and including the current tick.
    ///
    /// `Ok(None)` abstains (warmup, no data). An abstention emits no signal.
    fn score(&self, symbol: &str, history: &[Bar]) -> Result<Option<Score>, ScoringError>;
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn score(&self, symbol: &str, history: &[Bar]) -> Result<Option<Score>, ScoringError> {
        (**self).score(symbol, history)
    }
}

/// Maps numeric scores onto directions.
///
/// `score > long_above` is Long, `score < short_below` is Short, anything in
/// between is Exit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreThresholds {
    #[serde(default)]
    pub long_above: f64,
    #[serde(default)]
    pub short_below: f64,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            long_above: 0.0,
            short_below: 0.0,
        }
    }
}

impl ScoreThresholds {
    pub fn new(long_above: f64, short_below: f64) -> Result<Self, KernelError> {
        let thresholds = Self {
            long_above,
            short_below,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), KernelError> {
        if !self.long_above.is_finite() || !self.short_below.is_finite() {
            return Err(KernelError::Configuration(
                "score thresholds must be finite".into(),
            ));
        }
        if self.short_below > self.long_above {
            return Err(KernelError::Configuration(format!(
                "short_below ({}) must not exceed long_above ({})",
                self.short_below, self.long_above
            )));
        }
        Ok(())
    }

    /// Direction for a strategy output. Non-finite values are scoring failures.
    pub fn direction(&self, score: Score) -> Result<SignalDirection, ScoringError> {
        match score {
            Score::Directive(direction) => Ok(direction),
            Score::Value(v) if !v.is_finite() => Err(ScoringError::NonFinite(v)),
            Score::Value(v) if v > self.long_above => Ok(SignalDirection::Long),
            Score::Value(v) if v < self.short_below => Ok(SignalDirection::Short),
            Score::Value(_) => Ok(SignalDirection::Exit),
        }
    }
}
