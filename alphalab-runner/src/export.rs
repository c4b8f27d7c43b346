//! Reporting and export: JSON, CSV, and Markdown artifact generation.
//!
//! Provides three export formats for backtest results:
//! - **JSON**: full round-trip serialization with schema versioning
//! - **CSV**: fill tape and equity curve for external analysis tools
//! - **Markdown**: human-readable single-run report and search leaderboard
//!
//! All persisted artifacts include a `schema_version` field. Unknown versions
//! are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use alphalab_core::domain::{EquityPoint, FillEvent};

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::search::SearchReport;

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult` from JSON, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export fills as CSV.
///
/// Columns: timestamp, symbol, venue, side, quantity, fill_cost, commission, notional
pub fn export_fills_csv(fills: &[FillEvent]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "symbol",
        "venue",
        "side",
        "quantity",
        "fill_cost",
        "commission",
        "notional",
    ])?;

    for f in fills {
        wtr.write_record([
            &f.timestamp.to_rfc3339(),
            &f.symbol,
            &f.venue,
            &f.side.to_string(),
            &f.quantity.to_string(),
            &format!("{:.6}", f.fill_cost),
            &format!("{:.2}", f.commission),
            &format!("{:.2}", f.notional()),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export an equity curve as CSV with timestamp, equity and period_return columns.
pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity", "period_return"])?;
    for p in equity_curve {
        wtr.write_record([
            &p.timestamp.to_rfc3339(),
            &format!("{:.2}", p.total_equity),
            &format!("{:.8}", p.period_return),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the full artifact set for a single backtest run.
///
/// Creates a directory named `{strategy}_{run_id prefix}/` under `output_dir`
/// containing:
/// - `manifest.json`: the full `BacktestResult`
/// - `fills.csv`: fill tape
/// - `equity.csv`: tick-by-tick equity curve
/// - `report.md`: Markdown summary
///
/// Returns the path to the created directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let prefix = result.run_id.get(..12).unwrap_or(&result.run_id);
    let run_dir = output_dir.join(format!("{}_{}", result.strategy, prefix));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("manifest.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("fills.csv"), export_fills_csv(&result.fills)?)?;
    std::fs::write(run_dir.join("equity.csv"), export_equity_csv(&result.equity_curve)?)?;
    std::fs::write(run_dir.join("report.md"), generate_report(result))?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
///
/// Rejects unknown schema versions.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

// ─── Markdown reports ───────────────────────────────────────────────

/// Generate a Markdown report for a single backtest run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(1024);

    md.push_str("# Backtest Report\n\n");

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Strategy | {} |\n", result.strategy));
    md.push_str(&format!("| Symbols | {} |\n", result.symbols.join(", ")));
    md.push_str(&format!(
        "| Period | {} to {} |\n",
        result.start_date, result.end_date
    ));
    md.push_str(&format!("| Initial Cash | ${:.2} |\n", result.initial_cash));
    md.push_str(&format!("| Ticks | {} |\n", result.ticks));
    md.push_str(&format!("| Run ID | {} |\n", result.run_id));
    md.push_str(&format!("| Dataset Hash | {} |\n", result.dataset_hash));
    if result.has_synthetic {
        md.push_str("| Data | **SYNTHETIC** |\n");
    }
    if result.stopped_early {
        md.push_str("| Status | **CANCELLED** |\n");
    }
    md.push('\n');

    md.push_str("## Performance\n\n");
    md.push_str("| Metric | Value |\n");
    md.push_str("| --- | --- |\n");
    for (label, value) in result.summary.display_rows() {
        md.push_str(&format!("| {label} | {value} |\n"));
    }
    md.push_str(&format!("| Final Cash | ${:.2} |\n", result.final_cash));
    md.push_str(&format!("| Realized PnL | ${:.2} |\n", result.realized_pnl));
    md.push_str(&format!(
        "| Total Commission | ${:.2} |\n",
        result.total_commission
    ));
    md.push_str(&format!("| Fills | {} |\n", result.fills.len()));
    md.push('\n');

    if !result.recovered.is_empty() {
        md.push_str("## Recovered Errors\n\n");
        md.push_str("| Timestamp | Symbol | Kind | Detail |\n");
        md.push_str("| --- | --- | --- | --- |\n");
        for r in &result.recovered {
            md.push_str(&format!(
                "| {} | {} | {:?} | {} |\n",
                r.timestamp.to_rfc3339(),
                r.symbol,
                r.kind,
                r.detail
            ));
        }
        md.push('\n');
    }

    md
}

/// Generate a Markdown leaderboard for a factor search.
pub fn generate_search_report(report: &SearchReport) -> String {
    let mut md = String::with_capacity(1024);
    md.push_str("# Factor Search\n\n");
    md.push_str("| Rank | Candidate | Total Return | Sharpe | Max DD | Grade |\n");
    md.push_str("| --- | --- | --- | --- | --- | --- |\n");
    for (i, e) in report.entries.iter().enumerate() {
        let s = &e.result.summary;
        md.push_str(&format!(
            "| {} | {} | {:.2}% | {:.2} | {:.2}% | {:?} |\n",
            i + 1,
            e.name,
            s.total_return * 100.0,
            s.sharpe_ratio,
            s.max_drawdown * 100.0,
            e.grade
        ));
    }
    if let Some(best) = report.best() {
        md.push_str(&format!("\nBest: **{}**. {}\n", best.name, best.feedback));
    }
    if !report.failures.is_empty() {
        md.push_str("\n## Failed Candidates\n\n");
        for f in &report.failures {
            md.push_str(&format!("- {}: {}\n", f.name, f.error));
        }
    }
    md
}
