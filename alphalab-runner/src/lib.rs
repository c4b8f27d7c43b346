//! AlphaLab Runner: backtest orchestration, factor search, artifacts.
//!
//! This crate builds on `alphalab-core` to provide:
//! - TOML configuration with validation and content-addressed run IDs
//! - Data loading from CSV with a synthetic fallback
//! - Single-backtest runner
//! - Parallel factor search over candidate scoring functions, with feedback
//! - JSON / CSV / Markdown export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod runner;
pub mod search;

pub use config::{BacktestConfig, ConfigError, DataSource, RunId, StrategyConfig};
pub use data_loader::{load_bars, LoadError, LoadOptions, LoadedData};
pub use export::{
    export_equity_csv, export_fills_csv, export_json, generate_report, generate_search_report,
    import_json, load_artifacts, save_artifacts,
};
pub use runner::{
    build_strategy, load_options, run_backtest_from_data, run_single_backtest, BacktestResult,
    RunError, SCHEMA_VERSION,
};
pub use search::{default_candidates, feedback, run_search, FeedbackGrade, SearchReport};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn backtest_result_is_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
        assert_send::<LoadOptions>();
        assert_sync::<LoadOptions>();
    }

    #[test]
    fn run_error_is_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
    }

    #[test]
    fn search_report_is_send_sync() {
        assert_send::<SearchReport>();
        assert_sync::<SearchReport>();
    }
}
