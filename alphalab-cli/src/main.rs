//! AlphaLab CLI: run, search, and config validation commands.
//!
//! Commands:
//! - `run`: execute a backtest from a TOML config file
//! - `search`: evaluate candidate scoring functions and rank them by Sharpe
//! - `check-config`: parse and validate a config without running it

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use alphalab_runner::{
    default_candidates, generate_search_report, load_bars, load_options, run_search,
    run_single_backtest, save_artifacts, BacktestConfig, BacktestResult, DataSource,
};

#[derive(Parser)]
#[command(
    name = "alphalab",
    about = "AlphaLab CLI: deterministic event-driven backtesting kernel"
)]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Replace the configured data source with seeded synthetic bars.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Skip writing artifacts.
        #[arg(long, default_value_t = false)]
        no_save: bool,
    },
    /// Evaluate candidate strategies over the same data and rank them.
    Search {
        /// Path to a TOML config file. Candidates come from `[search]`.
        #[arg(long)]
        config: PathBuf,

        /// Replace the configured data source with seeded synthetic bars.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Write the Markdown leaderboard here.
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Parse and validate a config file.
    CheckConfig {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            config,
            synthetic,
            output_dir,
            no_save,
        } => run_backtest_cmd(config, synthetic, output_dir, no_save),
        Commands::Search {
            config,
            synthetic,
            report,
        } => run_search_cmd(config, synthetic, report),
        Commands::CheckConfig { config } => run_check_config(config),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path, synthetic: bool) -> Result<BacktestConfig> {
    let mut config = BacktestConfig::from_file(path)
        .with_context(|| format!("loading config {}", path.display()))?;
    if synthetic {
        config.data = DataSource::Synthetic { seed: 0 };
    }
    Ok(config)
}

fn run_backtest_cmd(
    config_path: PathBuf,
    synthetic: bool,
    output_dir: PathBuf,
    no_save: bool,
) -> Result<()> {
    let config = load_config(&config_path, synthetic)?;
    let result = run_single_backtest(&config)?;

    print_summary(&result);

    if !no_save {
        let run_dir = save_artifacts(&result, &output_dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_search_cmd(config_path: PathBuf, synthetic: bool, report: Option<PathBuf>) -> Result<()> {
    let config = load_config(&config_path, synthetic)?;
    let candidates = if config.search.candidates.is_empty() {
        default_candidates()
    } else {
        config.search.candidates.clone()
    };

    let loaded = load_bars(&config.backtest.symbols, &config.data, &load_options(&config)?)?;
    let outcome = run_search(
        &config,
        &candidates,
        &loaded.feed,
        &loaded.dataset_hash,
        loaded.has_synthetic,
    );

    println!();
    println!("=== Factor Search ===");
    println!(
        "{:<4} {:<24} {:>12} {:>8} {:>10}  Grade",
        "Rank", "Candidate", "Return", "Sharpe", "Max DD"
    );
    println!("{}", "-".repeat(70));
    for (i, e) in outcome.entries.iter().enumerate() {
        let s = &e.result.summary;
        println!(
            "{:<4} {:<24} {:>11.2}% {:>8.3} {:>9.2}%  {:?}",
            i + 1,
            e.name,
            s.total_return * 100.0,
            s.sharpe_ratio,
            s.max_drawdown * 100.0,
            e.grade
        );
    }
    for f in &outcome.failures {
        eprintln!("FAILED {}: {}", f.name, f.error);
    }

    let Some(best) = outcome.best() else {
        bail!("no candidate completed");
    };
    println!();
    println!(
        "Best: {} (Sharpe {:.3})",
        best.name, best.result.summary.sharpe_ratio
    );
    println!("{}", best.feedback);
    if loaded.has_synthetic {
        println!("WARNING: Results based on SYNTHETIC data");
    }

    if let Some(path) = report {
        std::fs::write(&path, generate_search_report(&outcome))
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Report saved to: {}", path.display());
    }
    Ok(())
}

fn run_check_config(config_path: PathBuf) -> Result<()> {
    let config = load_config(&config_path, false)?;
    println!("Config OK: {}", config_path.display());
    println!("Run ID:      {}", config.run_id());
    println!("Strategy:    {}", config.strategy.name());
    println!("Symbols:     {}", config.backtest.symbols.join(", "));
    println!(
        "Period:      {} to {}",
        config.backtest.start_date, config.backtest.end_date
    );
    println!("Sizing:      {:?}", config.sizing);
    println!("Commission:  {:?}", config.commission);
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    println!();
    println!("=== Backtest Result ===");
    println!("Strategy:       {}", result.strategy);
    println!("Symbols:        {}", result.symbols.join(", "));
    println!(
        "Period:         {} to {}",
        result.start_date, result.end_date
    );
    println!("Ticks:          {}", result.ticks);
    println!("Fills:          {}", result.fills.len());
    println!();
    println!("--- Performance ---");
    for (label, value) in result.summary.display_rows() {
        println!("{:<16}{}", format!("{label}:"), value);
    }
    println!("Final Cash:     {:.2}", result.final_cash);
    println!("Realized PnL:   {:.2}", result.realized_pnl);
    println!("Commission:     {:.2}", result.total_commission);
    if !result.recovered.is_empty() {
        println!();
        println!("Recovered errors: {}", result.recovered.len());
    }
    if result.stopped_early {
        println!("WARNING: run was cancelled before the data was exhausted");
    }
    if result.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
    println!("Run ID: {}", result.run_id);
}
