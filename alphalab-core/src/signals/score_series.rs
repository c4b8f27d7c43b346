//! Replay of an externally computed score series.
//!
//! Factor synthesis runs outside the kernel and hands over one score per
//! symbol per timestamp. Ticks without an entry abstain.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::{Score, ScoringError, Strategy};
use crate::domain::Bar;

#[derive(Debug, Clone, Default)]
pub struct ScoreSeries {
    name: String,
    scores: BTreeMap<String, BTreeMap<DateTime<Utc>, Score>>,
}

impl ScoreSeries {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scores: BTreeMap::new(),
        }
    }

    /// Build from `(timestamp, symbol, value)` rows. Later rows for the same key win.
    pub fn from_records(
        name: impl Into<String>,
        records: impl IntoIterator<Item = (DateTime<Utc>, String, f64)>,
    ) -> Self {
        let mut series = Self::new(name);
        for (timestamp, symbol, value) in records {
            series.insert(symbol, timestamp, Score::Value(value));
        }
        series
    }

    pub fn insert(&mut self, symbol: impl Into<String>, timestamp: DateTime<Utc>, score: Score) {
        self.scores
            .entry(symbol.into())
            .or_default()
            .insert(timestamp, score);
    }

    pub fn len(&self) -> usize {
        self.scores.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.scores.keys().map(String::as_str)
    }
}

impl Strategy for ScoreSeries {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, symbol: &str, history: &[Bar]) -> Result<Option<Score>, ScoringError> {
        let Some(bar) = history.last() else {
            return Ok(None);
        };
        Ok(self
            .scores
            .get(symbol)
            .and_then(|by_ts| by_ts.get(&bar.timestamp))
            .copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignalDirection;
    use chrono::TimeZone;

    #[test]
    fn looks_up_current_tick_only() {
        let t1 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let t2 = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();
        let mut series = ScoreSeries::from_records("factor", vec![(t1, "X".to_string(), 0.7)]);
        series.insert("X", t2, Score::Directive(SignalDirection::Exit));
        assert_eq!(series.len(), 2);

        let b1 = Bar::new("X", t1, 1.0, 1.0, 1.0, 1.0, 1.0);
        let b2 = Bar::new("X", t2, 1.0, 1.0, 1.0, 1.0, 1.0);
        assert_eq!(series.score("X", &[b1.clone()]).unwrap(), Some(Score::Value(0.7)));
        assert_eq!(
            series.score("X", &[b1.clone(), b2]).unwrap(),
            Some(Score::Directive(SignalDirection::Exit))
        );
        assert_eq!(series.score("Y", &[b1]).unwrap(), None);
        assert_eq!(series.score("X", &[]).unwrap(), None);
    }
}
