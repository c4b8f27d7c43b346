//! Backtest runner: wires together config, data, kernel and analyzer.
//!
//! Two entry points:
//! - `run_single_backtest()`: loads data for the config, then runs. Used by CLI.
//! - `run_backtest_from_data()`: takes a pre-loaded feed. Used by factor search.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use alphalab_core::analysis::{PerformanceAnalyzer, PerformanceSummary};
use alphalab_core::data::HistoricalFeed;
use alphalab_core::domain::{EquityPoint, FillEvent};
use alphalab_core::engine::{BacktestLoop, CancelToken, ExecutionSimulator, Portfolio};
use alphalab_core::signals::{MeanReversion, Momentum, Strategy};
use alphalab_core::{KernelError, RecoveredError};

use crate::config::{BacktestConfig, ConfigError, RunId, StrategyConfig};
use crate::data_loader::{load_bars, load_score_series, LoadError, LoadOptions};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("backtest halted: {0}")]
    Kernel(#[from] KernelError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub strategy: String,
    pub symbols: Vec<String>,
    pub start_date: String,
    pub end_date: String,
    pub initial_cash: f64,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub summary: PerformanceSummary,
    pub equity_curve: Vec<EquityPoint>,
    pub fills: Vec<FillEvent>,
    pub recovered: Vec<RecoveredError>,
    pub ticks: usize,
    pub stopped_early: bool,
    pub final_cash: f64,
    pub total_commission: f64,
    pub realized_pnl: f64,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Load data for `config` and run it.
pub fn run_single_backtest(config: &BacktestConfig) -> Result<BacktestResult, RunError> {
    let loaded = load_bars(&config.backtest.symbols, &config.data, &load_options(config)?)?;
    run_backtest_from_data(
        config,
        loaded.feed,
        &loaded.dataset_hash,
        loaded.has_synthetic,
        None,
    )
}

/// Window of bars a config covers.
pub fn load_options(config: &BacktestConfig) -> Result<LoadOptions, ConfigError> {
    Ok(LoadOptions {
        start: config.opening_instant()?,
        end: config.closing_instant()?,
    })
}

/// Build the scoring function a strategy config names.
pub fn build_strategy(config: &StrategyConfig) -> Result<Box<dyn Strategy>, RunError> {
    Ok(match config {
        StrategyConfig::Momentum { lookback } => Box::new(Momentum::new(*lookback)),
        StrategyConfig::MeanReversion { lookback } => Box::new(MeanReversion::new(*lookback)),
        StrategyConfig::ScoreFile { path, .. } => {
            Box::new(load_score_series(path, &config.name())?)
        }
    })
}

/// Run a backtest over a pre-loaded feed without bar I/O.
///
/// The feed must not have been advanced.
pub fn run_backtest_from_data(
    config: &BacktestConfig,
    feed: HistoricalFeed,
    dataset_hash: &str,
    has_synthetic: bool,
    cancel: Option<CancelToken>,
) -> Result<BacktestResult, RunError> {
    let strategy = build_strategy(&config.strategy)?;
    let execution = ExecutionSimulator::from_config(&config.commission, &config.backtest.venue)?;
    let portfolio = Portfolio::new(
        config.backtest.initial_cash,
        config.opening_instant()?,
        config.portfolio_config(),
    );

    let mut bt = BacktestLoop::new(feed, strategy, portfolio, execution)
        .with_thresholds(config.signal)
        .with_analyzer(PerformanceAnalyzer::new(config.backtest.annualization_factor));
    if let Some(token) = cancel {
        bt = bt.with_cancel_token(token);
    }

    let run_id = config.run_id();
    info!(%run_id, strategy = %config.strategy.name(), "running backtest");
    let out = bt.run()?;

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id,
        strategy: config.strategy.name(),
        symbols: config.backtest.symbols.clone(),
        start_date: config.backtest.start_date.clone(),
        end_date: config.backtest.end_date.clone(),
        initial_cash: config.backtest.initial_cash,
        dataset_hash: dataset_hash.to_string(),
        has_synthetic,
        summary: out.summary,
        equity_curve: out.equity_curve,
        fills: out.fills,
        recovered: out.recovered,
        ticks: out.ticks,
        stopped_early: out.stopped_early,
        final_cash: out.final_cash,
        total_commission: out.total_commission,
        realized_pnl: out.realized_pnl,
    })
}
