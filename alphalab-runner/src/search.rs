//! Factor search: evaluate candidate scoring functions over the same data.
//!
//! Each candidate is an independent single-threaded kernel run on its own
//! copy of the feed. Candidates run in parallel; the ranking is sorted by
//! Sharpe ratio (descending), then name, so it does not depend on thread
//! scheduling.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use alphalab_core::analysis::PerformanceSummary;
use alphalab_core::data::HistoricalFeed;

use crate::config::{BacktestConfig, StrategyConfig};
use crate::runner::{run_backtest_from_data, BacktestResult};

/// Qualitative verdict on a candidate's risk-adjusted return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackGrade {
    Poor,
    Moderate,
    Promising,
}

impl FeedbackGrade {
    /// Sharpe above 1.0 is promising, above 0.5 moderate, anything else poor.
    pub fn from_sharpe(sharpe: f64) -> Self {
        if sharpe > 1.0 {
            Self::Promising
        } else if sharpe > 0.5 {
            Self::Moderate
        } else {
            Self::Poor
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Promising => {
                "Promising risk-adjusted performance. Validate it on a wider set of symbols and periods."
            }
            Self::Moderate => {
                "Moderate performance. Refine the scoring function or its lookback to improve risk-adjusted returns."
            }
            Self::Poor => {
                "Poor performance: returns do not compensate for the risk taken. Revise the scoring function substantially, for example by adding volume or volatility inputs."
            }
        }
    }
}

/// Feedback for a finished run.
pub fn feedback(summary: &PerformanceSummary) -> (FeedbackGrade, &'static str) {
    let grade = FeedbackGrade::from_sharpe(summary.sharpe_ratio);
    (grade, grade.message())
}

/// One evaluated candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchEntry {
    pub name: String,
    pub strategy: StrategyConfig,
    pub grade: FeedbackGrade,
    pub feedback: String,
    pub result: BacktestResult,
}

/// A candidate whose run failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchReport {
    /// Ranked best first.
    pub entries: Vec<SearchEntry>,
    pub failures: Vec<SearchFailure>,
}

impl SearchReport {
    pub fn best(&self) -> Option<&SearchEntry> {
        self.entries.first()
    }
}

/// Candidates evaluated when a config lists none.
pub fn default_candidates() -> Vec<StrategyConfig> {
    let momentum = [5, 10, 20, 60].map(|lookback| StrategyConfig::Momentum { lookback });
    let reversion = [5, 10, 20].map(|lookback| StrategyConfig::MeanReversion { lookback });
    momentum.into_iter().chain(reversion).collect()
}

/// Run every candidate against `feed` with the rest of `base` unchanged.
pub fn run_search(
    base: &BacktestConfig,
    candidates: &[StrategyConfig],
    feed: &HistoricalFeed,
    dataset_hash: &str,
    has_synthetic: bool,
) -> SearchReport {
    info!(candidates = candidates.len(), "factor search started");

    let outcomes: Vec<_> = candidates
        .par_iter()
        .map(|candidate| {
            let config = base.with_strategy(candidate.clone());
            let outcome =
                run_backtest_from_data(&config, feed.clone(), dataset_hash, has_synthetic, None);
            (candidate, outcome)
        })
        .collect();

    let mut entries = Vec::new();
    let mut failures = Vec::new();
    for (candidate, outcome) in outcomes {
        let name = candidate.name();
        match outcome {
            Ok(result) => {
                let (grade, message) = feedback(&result.summary);
                entries.push(SearchEntry {
                    name,
                    strategy: candidate.clone(),
                    grade,
                    feedback: message.to_string(),
                    result,
                });
            }
            Err(e) => {
                warn!(candidate = %name, error = %e, "candidate failed");
                failures.push(SearchFailure {
                    name,
                    error: e.to_string(),
                });
            }
        }
    }

    rank(&mut entries);
    if let Some(best) = entries.first() {
        info!(
            best = %best.name,
            sharpe = best.result.summary.sharpe_ratio,
            "factor search finished"
        );
    }
    SearchReport { entries, failures }
}

/// Sharpe descending, ties broken by name.
fn rank(entries: &mut [SearchEntry]) {
    entries.sort_by(|a, b| {
        b.result
            .summary
            .sharpe_ratio
            .total_cmp(&a.result.summary.sharpe_ratio)
            .then_with(|| a.name.cmp(&b.name))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_thresholds() {
        assert_eq!(FeedbackGrade::from_sharpe(1.5), FeedbackGrade::Promising);
        assert_eq!(FeedbackGrade::from_sharpe(1.0), FeedbackGrade::Moderate);
        assert_eq!(FeedbackGrade::from_sharpe(0.75), FeedbackGrade::Moderate);
        assert_eq!(FeedbackGrade::from_sharpe(0.5), FeedbackGrade::Poor);
        assert_eq!(FeedbackGrade::from_sharpe(-2.0), FeedbackGrade::Poor);
    }

    #[test]
    fn default_grid_has_unique_names() {
        let names: std::collections::BTreeSet<String> =
            default_candidates().iter().map(StrategyConfig::name).collect();
        assert_eq!(names.len(), default_candidates().len());
    }

    #[test]
    fn feedback_reads_sharpe_from_summary() {
        let summary = PerformanceSummary {
            total_return: 0.1,
            sharpe_ratio: 2.0,
            max_drawdown: 0.05,
            drawdown_duration: 3,
            periods: 100,
        };
        let (grade, message) = feedback(&summary);
        assert_eq!(grade, FeedbackGrade::Promising);
        assert!(message.starts_with("Promising"));
    }
}
