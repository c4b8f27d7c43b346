//! Bar and score loading for the runner.
//!
//! Bars come from one CSV per symbol (`<dir>/<SYMBOL>.csv`, header
//! `timestamp,open,high,low,close,volume`) or, for development, from a
//! seeded random walk. Timestamps are RFC 3339 or `YYYY-MM-DD` (midnight UTC).
//!
//! Synthetic data is a developer-only debug mode. Results produced on
//! synthetic data are tagged as such.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use alphalab_core::data::{FeedError, HistoricalFeed};
use alphalab_core::domain::Bar;
use alphalab_core::signals::ScoreSeries;

use crate::config::DataSource;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no data file for '{symbol}' at {}", path.display())]
    MissingSymbol { symbol: String, path: PathBuf },

    #[error("failed to read {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{}: row {row}: unparseable timestamp '{value}'", path.display())]
    Timestamp {
        path: PathBuf,
        row: usize,
        value: String,
    },

    #[error("feed error: {0}")]
    Feed(#[from] FeedError),
}

/// Window of bars to load: `start < timestamp <= end`.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Loaded bars, ready to replay.
#[derive(Debug)]
pub struct LoadedData {
    pub feed: HistoricalFeed,
    /// BLAKE3 over every loaded bar, symbols in sorted order.
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub bar_count: usize,
}

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct ScoreRow {
    timestamp: String,
    symbol: String,
    score: f64,
}

/// Load bars for `symbols` from `source`, restricted to the window.
pub fn load_bars(
    symbols: &[String],
    source: &DataSource,
    opts: &LoadOptions,
) -> Result<LoadedData, LoadError> {
    let mut all_bars: BTreeMap<String, Vec<Bar>> = BTreeMap::new();
    let has_synthetic = matches!(source, DataSource::Synthetic { .. });

    for symbol in symbols {
        let mut bars = match source {
            DataSource::Csv { dir } => {
                let path = dir.join(format!("{symbol}.csv"));
                if !path.exists() {
                    return Err(LoadError::MissingSymbol {
                        symbol: symbol.clone(),
                        path,
                    });
                }
                load_csv_bars(&path, symbol)?
            }
            DataSource::Synthetic { seed } => {
                warn!(%symbol, "generating synthetic data; results will be tagged as synthetic");
                generate_synthetic_bars(
                    symbol,
                    *seed,
                    opts.start.date_naive(),
                    opts.end.date_naive(),
                )
            }
        };
        bars.retain(|b| b.timestamp > opts.start && b.timestamp <= opts.end);
        info!(%symbol, bars = bars.len(), "loaded bars");
        all_bars.insert(symbol.clone(), bars);
    }

    let dataset_hash = compute_dataset_hash(&all_bars);
    let bar_count = all_bars.values().map(Vec::len).sum();
    let feed = HistoricalFeed::new(all_bars)?;

    Ok(LoadedData {
        feed,
        dataset_hash,
        has_synthetic,
        bar_count,
    })
}

/// Read one symbol's bars from CSV, sorted by timestamp.
pub fn load_csv_bars(path: &Path, symbol: &str) -> Result<Vec<Bar>, LoadError> {
    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut bars = Vec::new();
    for (i, row) in reader.deserialize::<BarRow>().enumerate() {
        let row = row.map_err(csv_err)?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            path: path.to_path_buf(),
            row: i + 1,
            value: row.timestamp.clone(),
        })?;
        bars.push(Bar::new(
            symbol, timestamp, row.open, row.high, row.low, row.close, row.volume,
        ));
    }
    bars.sort_by_key(|b| b.timestamp);
    Ok(bars)
}

/// Read a `timestamp,symbol,score` CSV into a replayable score series.
pub fn load_score_series(path: &Path, name: &str) -> Result<ScoreSeries, LoadError> {
    let csv_err = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut records = Vec::new();
    for (i, row) in reader.deserialize::<ScoreRow>().enumerate() {
        let row = row.map_err(csv_err)?;
        let timestamp = parse_timestamp(&row.timestamp).ok_or_else(|| LoadError::Timestamp {
            path: path.to_path_buf(),
            row: i + 1,
            value: row.timestamp.clone(),
        })?;
        records.push((timestamp, row.symbol, row.score));
    }
    info!(path = %path.display(), scores = records.len(), "loaded score series");
    Ok(ScoreSeries::from_records(name, records))
}

/// RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Compute a deterministic BLAKE3 hash over all bar data.
fn compute_dataset_hash(bars: &BTreeMap<String, Vec<Bar>>) -> String {
    let mut hasher = blake3::Hasher::new();
    for (symbol, series) in bars {
        hasher.update(symbol.as_bytes());
        for bar in series {
            hasher.update(&bar.timestamp.timestamp().to_le_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}

/// Generate synthetic daily bars: a random walk from 100.0, weekdays only.
///
/// The RNG is seeded from BLAKE3 of the symbol and `seed`, so the same
/// inputs always produce the same series.
pub fn generate_synthetic_bars(symbol: &str, seed: u64, start: NaiveDate, end: NaiveDate) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    hasher.update(&seed.to_le_bytes());
    let mut rng = StdRng::from_seed(*hasher.finalize().as_bytes());

    let mut bars = Vec::new();
    let mut price = 100.0_f64;
    let mut current = start;

    while current <= end {
        let weekday = current.weekday();
        if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
            current += Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.03..0.03);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64) as f64;

        bars.push(Bar::new(
            symbol,
            current.and_time(chrono::NaiveTime::MIN).and_utc(),
            open,
            high,
            low,
            close,
            volume,
        ));

        price = close;
        current += Duration::days(1);
    }

    bars
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn timestamps_accept_three_formats() {
        let a = parse_timestamp("2024-01-02").unwrap();
        let b = parse_timestamp("2024-01-02T00:00:00Z").unwrap();
        let c = parse_timestamp("2024-01-02 00:00:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(parse_timestamp("02/01/2024").is_none());
    }

    #[test]
    fn synthetic_bars_are_deterministic_and_skip_weekends() {
        let a = generate_synthetic_bars("SPY", 1, d(2024, 1, 1), d(2024, 1, 14));
        let b = generate_synthetic_bars("SPY", 1, d(2024, 1, 1), d(2024, 1, 14));
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
        assert!(a.iter().all(|bar| bar.timestamp.weekday().number_from_monday() <= 5));
        assert!(a.iter().all(Bar::is_sane));

        let other_seed = generate_synthetic_bars("SPY", 2, d(2024, 1, 1), d(2024, 1, 14));
        assert_ne!(a, other_seed);
    }

    #[test]
    fn synthetic_source_builds_a_tagged_feed() {
        let opts = LoadOptions {
            start: d(2023, 12, 31).and_time(chrono::NaiveTime::MIN).and_utc(),
            end: d(2024, 1, 31).and_time(chrono::NaiveTime::MIN).and_utc(),
        };
        let loaded = load_bars(
            &["AAA".to_string(), "BBB".to_string()],
            &DataSource::Synthetic { seed: 0 },
            &opts,
        )
        .unwrap();
        assert!(loaded.has_synthetic);
        assert_eq!(loaded.feed.tick_count(), 23);
        assert_eq!(loaded.bar_count, 46);
        assert_eq!(loaded.dataset_hash.len(), 64);
    }
}
