//! Market data feed: the kernel's view of historical bars.
//!
//! The feed owns the bar data and a cursor. The loop advances the cursor one
//! tick at a time; everything else only reads bars at or before the cursor,
//! so no stage can see a future bar.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::Bar;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    #[error("bars for {symbol} are not strictly increasing at {timestamp}")]
    Unordered {
        symbol: String,
        timestamp: DateTime<Utc>,
    },

    #[error("bar for {symbol} at {timestamp} failed sanity checks")]
    InsaneBar {
        symbol: String,
        timestamp: DateTime<Utc>,
    },

    #[error("bar symbol '{found}' filed under '{expected}'")]
    SymbolMismatch { expected: String, found: String },
}

/// Source of bars replayed through the kernel.
pub trait MarketDataFeed {
    /// Symbol universe, sorted.
    fn symbols(&self) -> &[String];

    /// Move to the next tick. Returns the symbols that have a new bar at that
    /// tick (sorted), or `None` once every bar has been delivered.
    fn advance(&mut self) -> Option<Vec<String>>;

    /// Most recent bar delivered for `symbol`.
    fn latest_bar(&self, symbol: &str) -> Option<&Bar>;

    /// Close of the most recent bar delivered for `symbol`.
    fn latest_price(&self, symbol: &str) -> Option<f64> {
        self.latest_bar(symbol).map(|b| b.close)
    }

    /// Every bar delivered so far for `symbol`, oldest first.
    fn history(&self, symbol: &str) -> &[Bar];

    fn is_exhausted(&self) -> bool;
}

/// In-memory feed over pre-loaded bars for several symbols.
///
/// Ticks are the union of all bar timestamps. A symbol without a bar at a
/// tick keeps its previous latest bar.
#[derive(Debug, Clone)]
pub struct HistoricalFeed {
    symbols: Vec<String>,
    bars: BTreeMap<String, Vec<Bar>>,
    ticks: Vec<DateTime<Utc>>,
    /// Number of bars delivered per symbol.
    cursors: BTreeMap<String, usize>,
    next_tick: usize,
}

impl HistoricalFeed {
    /// Build a feed, validating ordering and OHLC sanity per symbol.
    pub fn new(bars: BTreeMap<String, Vec<Bar>>) -> Result<Self, FeedError> {
        let mut all_ticks = BTreeSet::new();
        for (symbol, series) in &bars {
            let mut prev: Option<DateTime<Utc>> = None;
            for bar in series {
                if &bar.symbol != symbol {
                    return Err(FeedError::SymbolMismatch {
                        expected: symbol.clone(),
                        found: bar.symbol.clone(),
                    });
                }
                if prev.is_some_and(|p| bar.timestamp <= p) {
                    return Err(FeedError::Unordered {
                        symbol: symbol.clone(),
                        timestamp: bar.timestamp,
                    });
                }
                if !bar.is_sane() {
                    return Err(FeedError::InsaneBar {
                        symbol: symbol.clone(),
                        timestamp: bar.timestamp,
                    });
                }
                prev = Some(bar.timestamp);
                all_ticks.insert(bar.timestamp);
            }
        }

        Ok(Self {
            symbols: bars.keys().cloned().collect(),
            cursors: bars.keys().map(|s| (s.clone(), 0)).collect(),
            ticks: all_ticks.into_iter().collect(),
            bars,
            next_tick: 0,
        })
    }

    /// Build a feed from a flat list of bars, grouping by symbol and sorting by timestamp.
    pub fn from_bars(bars: impl IntoIterator<Item = Bar>) -> Result<Self, FeedError> {
        let mut grouped: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
        for bar in bars {
            grouped.entry(bar.symbol.clone()).or_default().push(bar);
        }
        for series in grouped.values_mut() {
            series.sort_by_key(|b| b.timestamp);
        }
        Self::new(grouped)
    }

    /// Restrict to bars with `start < timestamp <= end` and rewind to the first tick.
    pub fn with_window(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        for series in self.bars.values_mut() {
            series.retain(|b| b.timestamp > start && b.timestamp <= end);
        }
        self.ticks.retain(|t| *t > start && *t <= end);
        self.rewind();
        self
    }

    /// Move the cursor back before the first tick. Nothing has been delivered afterwards.
    pub fn rewind(&mut self) {
        for cursor in self.cursors.values_mut() {
            *cursor = 0;
        }
        self.next_tick = 0;
    }

    /// Total number of ticks the feed will deliver.
    pub fn tick_count(&self) -> usize {
        self.ticks.len()
    }

    /// Timestamp of the first tick, if any.
    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.ticks.first().copied()
    }

    /// Timestamp of the current tick, if the feed has started.
    pub fn current_timestamp(&self) -> Option<DateTime<Utc>> {
        self.next_tick.checked_sub(1).map(|i| self.ticks[i])
    }

    /// All bars for a symbol, including those not yet delivered.
    pub fn full_series(&self, symbol: &str) -> &[Bar] {
        self.bars.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl MarketDataFeed for HistoricalFeed {
    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn advance(&mut self) -> Option<Vec<String>> {
        let tick = *self.ticks.get(self.next_tick)?;
        self.next_tick += 1;

        let mut updated = Vec::new();
        for (symbol, series) in &self.bars {
            let cursor = self.cursors.entry(symbol.clone()).or_insert(0);
            if series.get(*cursor).is_some_and(|b| b.timestamp == tick) {
                *cursor += 1;
                updated.push(symbol.clone());
            }
        }
        Some(updated)
    }

    fn latest_bar(&self, symbol: &str) -> Option<&Bar> {
        self.history(symbol).last()
    }

    fn history(&self, symbol: &str) -> &[Bar] {
        match (self.bars.get(symbol), self.cursors.get(symbol)) {
            (Some(series), Some(&cursor)) => &series[..cursor],
            _ => &[],
        }
    }

    fn is_exhausted(&self) -> bool {
        self.next_tick >= self.ticks.len()
    }
}
