//! Mean reversion: negated z-score of the close against its rolling window.
//!
//! A close far above the window mean scores negative (expect a fall), far
//! below scores positive. A flat window scores 0.

use super::{Score, ScoringError, Strategy};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct MeanReversion {
    lookback: usize,
    name: String,
}

impl MeanReversion {
    pub fn new(lookback: usize) -> Self {
        let lookback = lookback.max(2);
        Self {
            lookback,
            name: format!("mean_reversion_{lookback}"),
        }
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }
}

impl Strategy for MeanReversion {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, _symbol: &str, history: &[Bar]) -> Result<Option<Score>, ScoringError> {
        if history.len() < self.lookback {
            return Ok(None);
        }
        let window = &history[history.len() - self.lookback..];
        let n = window.len() as f64;
        let mean = window.iter().map(|b| b.close).sum::<f64>() / n;
        let var = window.iter().map(|b| (b.close - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let sd = var.sqrt();
        if sd < 1e-15 {
            return Ok(Some(Score::Value(0.0)));
        }
        let last = window[window.len() - 1].close;
        Ok(Some(Score::Value(-(last - mean) / sd)))
    }
}
