//! Price momentum: `close[t] - close[t - lookback]`.

use super::{Score, ScoringError, Strategy};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Momentum {
    lookback: usize,
    name: String,
}

impl Momentum {
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback: lookback.max(1),
            name: format!("momentum_{}", lookback.max(1)),
        }
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }
}

impl Strategy for Momentum {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, _symbol: &str, history: &[Bar]) -> Result<Option<Score>, ScoringError> {
        if history.len() <= self.lookback {
            return Ok(None);
        }
        let last = history[history.len() - 1].close;
        let then = history[history.len() - 1 - self.lookback].close;
        Ok(Some(Score::Value(last - then)))
    }
}
