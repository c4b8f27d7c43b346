//! Performance analyzer: pure statistics over an equity curve.
//!
//! Every metric is a pure function of the curve; nothing here draws random
//! numbers or reads clocks. Degenerate inputs (empty curve, single point,
//! zero variance) produce 0.0 sentinels rather than NaN.

use serde::{Deserialize, Serialize};

use crate::domain::EquityPoint;

/// Trading days per year, the default annualization factor for daily bars.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    /// Fractional return from the first to the last point.
    pub total_return: f64,
    pub sharpe_ratio: f64,
    /// Largest peak-to-trough decline as a positive fraction.
    pub max_drawdown: f64,
    /// Longest run of points strictly below the running peak.
    pub drawdown_duration: usize,
    /// Number of points in the curve.
    pub periods: usize,
}

impl PerformanceSummary {
    pub fn from_curve(curve: &[EquityPoint], annualization_factor: f64) -> Self {
        let equity: Vec<f64> = curve.iter().map(|p| p.total_equity).collect();
        Self::from_equity(&equity, annualization_factor)
    }

    pub fn from_equity(equity: &[f64], annualization_factor: f64) -> Self {
        let (max_drawdown, drawdown_duration) = drawdown_stats(equity);
        Self {
            total_return: total_return(equity),
            sharpe_ratio: sharpe_ratio(&period_returns(equity), annualization_factor),
            max_drawdown,
            drawdown_duration,
            periods: equity.len(),
        }
    }

    /// Summary table rows, labelled and formatted for display.
    pub fn display_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Total Return", format!("{:.2}%", self.total_return * 100.0)),
            ("Sharpe Ratio", format!("{:.2}", self.sharpe_ratio)),
            ("Max Drawdown", format!("{:.2}%", self.max_drawdown * 100.0)),
            ("Drawdown Duration", self.drawdown_duration.to_string()),
        ]
    }
}

impl Default for PerformanceSummary {
    fn default() -> Self {
        Self::from_equity(&[], TRADING_DAYS_PER_YEAR)
    }
}

/// Computes summaries with a fixed annualization factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerformanceAnalyzer {
    pub annualization_factor: f64,
}

impl Default for PerformanceAnalyzer {
    fn default() -> Self {
        Self {
            annualization_factor: TRADING_DAYS_PER_YEAR,
        }
    }
}

impl PerformanceAnalyzer {
    pub fn new(annualization_factor: f64) -> Self {
        Self {
            annualization_factor,
        }
    }

    pub fn summarize(&self, curve: &[EquityPoint]) -> PerformanceSummary {
        PerformanceSummary::from_curve(curve, self.annualization_factor)
    }
}

// ── Individual metrics ──

/// `last / first - 1`. 0.0 for fewer than two points or a non-positive start.
pub fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&first), Some(&last)) if equity.len() >= 2 && first > 0.0 => last / first - 1.0,
        _ => 0.0,
    }
}

/// Simple returns between consecutive points. A non-positive previous value yields 0.0.
pub fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

/// Annualized Sharpe ratio with a zero risk-free rate.
///
/// `mean / sample_stdev * sqrt(annualization_factor)`. Returns 0.0 for fewer
/// than two returns, zero variance, or a non-finite result.
pub fn sharpe_ratio(returns: &[f64], annualization_factor: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = mean(returns);
    let sd = std_dev(returns);
    if sd < 1e-15 {
        return 0.0;
    }
    let sharpe = mean / sd * annualization_factor.max(0.0).sqrt();
    if sharpe.is_finite() {
        sharpe
    } else {
        0.0
    }
}

/// Maximum drawdown (positive fraction) and the longest drawdown run, in one pass.
pub fn drawdown_stats(equity: &[f64]) -> (f64, usize) {
    let Some(&first) = equity.first() else {
        return (0.0, 0);
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut run = 0usize;
    let mut longest = 0usize;

    for &eq in equity {
        if eq >= peak {
            peak = eq;
            run = 0;
            continue;
        }
        run += 1;
        longest = longest.max(run);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    (max_dd, longest)
}

pub fn max_drawdown(equity: &[f64]) -> f64 {
    drawdown_stats(equity).0
}

pub fn drawdown_duration(equity: &[f64]) -> usize {
    drawdown_stats(equity).1
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawdown_of_reference_curve() {
        let eq = [100.0, 120.0, 90.0, 95.0, 130.0];
        assert!((max_drawdown(&eq) - 0.25).abs() < 1e-12);
        assert_eq!(drawdown_duration(&eq), 2);
        assert!((total_return(&eq) - 0.30).abs() < 1e-12);
    }

    #[test]
    fn monotonic_curve_has_no_drawdown() {
        let eq = [100.0, 101.0, 102.0, 102.0];
        assert_eq!(drawdown_stats(&eq), (0.0, 0));
    }

    #[test]
    fn zero_variance_sharpe_is_zero() {
        assert_eq!(sharpe_ratio(&[0.01, 0.01, 0.01], 252.0), 0.0);
        assert_eq!(sharpe_ratio(&[0.01], 252.0), 0.0);
        assert_eq!(sharpe_ratio(&[], 252.0), 0.0);
    }

    #[test]
    fn sharpe_uses_sample_stdev() {
        // mean 0.01, sample sd 0.01 * sqrt(2)
        let s = sharpe_ratio(&[0.0, 0.02], 4.0);
        assert!((s - 2.0 / 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn empty_and_single_point_are_sentinels() {
        let empty = PerformanceSummary::from_equity(&[], 252.0);
        assert_eq!(empty.total_return, 0.0);
        assert_eq!(empty.sharpe_ratio, 0.0);
        assert_eq!(empty.max_drawdown, 0.0);
        assert_eq!(empty.drawdown_duration, 0);
        assert_eq!(empty.periods, 0);

        let single = PerformanceSummary::from_equity(&[100.0], 252.0);
        assert_eq!(single.total_return, 0.0);
        assert_eq!(single.periods, 1);
    }

    #[test]
    fn display_rows_match_summary_table() {
        let s = PerformanceSummary::from_equity(&[100_000.0, 100_997.4], 252.0);
        let rows = s.display_rows();
        assert_eq!(rows[0], ("Total Return", "1.00%".to_string()));
        assert_eq!(rows[1].0, "Sharpe Ratio");
        assert_eq!(rows[2], ("Max Drawdown", "0.00%".to_string()));
        assert_eq!(rows[3], ("Drawdown Duration", "0".to_string()));
    }
}
