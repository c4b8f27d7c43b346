//! TOML backtest configuration.
//!
//! ```toml
//! [backtest]
//! initial_cash = 100000.0
//! start_date = "2024-01-01"
//! end_date = "2024-12-31"
//! symbols = ["SPY", "QQQ"]
//!
//! [sizing]
//! type = "fixed_shares"
//! shares = 100
//!
//! [commission]
//! type = "ib_tiered"
//!
//! [strategy]
//! type = "momentum"
//! lookback = 20
//!
//! [data]
//! source = "csv"
//! dir = "data"
//! ```
//!
//! Every section but `[backtest]` and `[strategy]` has a default.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use alphalab_core::engine::execution::DEFAULT_VENUE;
use alphalab_core::engine::{CommissionConfig, PortfolioConfig, SizingPolicy};
use alphalab_core::signals::ScoreThresholds;
use alphalab_core::analysis::TRADING_DAYS_PER_YEAR;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid {field} '{value}': expected YYYY-MM-DD")]
    Date { field: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    #[serde(default = "default_sizing")]
    pub sizing: SizingPolicy,
    #[serde(default)]
    pub commission: CommissionConfig,
    #[serde(default)]
    pub policy: PolicySection,
    #[serde(default)]
    pub signal: ScoreThresholds,
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub data: DataSource,
    #[serde(default)]
    pub search: SearchSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub initial_cash: f64,
    /// First trading date, inclusive.
    pub start_date: String,
    /// Last trading date, inclusive.
    pub end_date: String,
    pub symbols: Vec<String>,
    #[serde(default = "default_annualization")]
    pub annualization_factor: f64,
    #[serde(default = "default_venue")]
    pub venue: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicySection {
    #[serde(default)]
    pub allow_short: bool,
    #[serde(default)]
    pub allow_margin: bool,
}

/// Scoring function selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    Momentum { lookback: usize },
    MeanReversion { lookback: usize },
    /// Externally computed scores, CSV with `timestamp,symbol,score`.
    ScoreFile {
        path: PathBuf,
        #[serde(default)]
        name: Option<String>,
    },
}

impl StrategyConfig {
    /// Display name, matching the built strategy's `name()`.
    pub fn name(&self) -> String {
        match self {
            Self::Momentum { lookback } => format!("momentum_{lookback}"),
            Self::MeanReversion { lookback } => format!("mean_reversion_{lookback}"),
            Self::ScoreFile { path, name } => name.clone().unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "score_file".into())
            }),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match self {
            Self::Momentum { lookback } if *lookback == 0 => Err(ConfigError::Invalid(
                "momentum lookback must be at least 1".into(),
            )),
            Self::MeanReversion { lookback } if *lookback < 2 => Err(ConfigError::Invalid(
                "mean_reversion lookback must be at least 2".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Where bars come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DataSource {
    /// One `<SYMBOL>.csv` per symbol under `dir`.
    Csv { dir: PathBuf },
    /// Seeded random walk. Developer-only; results are tagged synthetic.
    Synthetic {
        #[serde(default)]
        seed: u64,
    },
}

impl Default for DataSource {
    fn default() -> Self {
        Self::Csv {
            dir: PathBuf::from("data"),
        }
    }
}

/// Candidate strategies for factor search. Empty means the built-in grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchSection {
    #[serde(default)]
    pub candidates: Vec<StrategyConfig>,
}

fn default_sizing() -> SizingPolicy {
    SizingPolicy::FixedShares { shares: 100 }
}

fn default_annualization() -> f64 {
    TRADING_DAYS_PER_YEAR
}

fn default_venue() -> String {
    DEFAULT_VENUE.to_string()
}

impl BacktestConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&s)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bt = &self.backtest;
        if !(bt.initial_cash.is_finite() && bt.initial_cash > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "initial_cash must be positive, got {}",
                bt.initial_cash
            )));
        }
        if bt.symbols.is_empty() {
            return Err(ConfigError::Invalid("symbols must not be empty".into()));
        }
        let unique: BTreeSet<&str> = bt.symbols.iter().map(String::as_str).collect();
        if unique.len() != bt.symbols.len() {
            return Err(ConfigError::Invalid("symbols must be unique".into()));
        }
        if bt.symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid("symbols must not be blank".into()));
        }
        if !(bt.annualization_factor.is_finite() && bt.annualization_factor > 0.0) {
            return Err(ConfigError::Invalid(
                "annualization_factor must be positive".into(),
            ));
        }
        if bt.venue.trim().is_empty() {
            return Err(ConfigError::Invalid("venue must not be blank".into()));
        }
        let (start, end) = (self.start_date()?, self.end_date()?);
        if start > end {
            return Err(ConfigError::Invalid(format!(
                "start_date {start} is after end_date {end}"
            )));
        }

        let kernel = |e: alphalab_core::KernelError| ConfigError::Invalid(e.to_string());
        self.sizing.validate().map_err(kernel)?;
        self.commission.build().map_err(kernel)?;
        self.signal.validate().map_err(kernel)?;
        self.strategy.validate()?;
        for candidate in &self.search.candidates {
            candidate.validate()?;
        }
        Ok(())
    }

    pub fn start_date(&self) -> Result<NaiveDate, ConfigError> {
        parse_date("start_date", &self.backtest.start_date)
    }

    pub fn end_date(&self) -> Result<NaiveDate, ConfigError> {
        parse_date("end_date", &self.backtest.end_date)
    }

    /// Timestamp of the opening equity point: one second before `start_date`.
    ///
    /// Bars stamped at midnight on `start_date` fall strictly after it.
    pub fn opening_instant(&self) -> Result<DateTime<Utc>, ConfigError> {
        Ok(midnight(self.start_date()?) - Duration::seconds(1))
    }

    /// Last instant included in the run: the end of `end_date`.
    pub fn closing_instant(&self) -> Result<DateTime<Utc>, ConfigError> {
        Ok(midnight(self.end_date()?) + Duration::days(1) - Duration::seconds(1))
    }

    pub fn portfolio_config(&self) -> PortfolioConfig {
        PortfolioConfig {
            sizing: self.sizing.clone(),
            allow_short: self.policy.allow_short,
            allow_margin: self.policy.allow_margin,
        }
    }

    /// Same configuration with a different strategy.
    pub fn with_strategy(&self, strategy: StrategyConfig) -> Self {
        Self {
            strategy,
            ..self.clone()
        }
    }

    /// Deterministic BLAKE3 hash of the configuration.
    ///
    /// Two runs with identical configs share a RunId.
    pub fn run_id(&self) -> RunId {
        let canonical = match serde_json::to_string(self) {
            Ok(json) => json,
            Err(_) => format!("{self:?}"),
        };
        blake3::hash(canonical.as_bytes()).to_hex().to_string()
    }
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| ConfigError::Date {
        field,
        value: value.to_string(),
    })
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}
