//! Factor search over synthetic data.

use proptest::prelude::*;

use alphalab_runner::{
    default_candidates, generate_search_report, load_bars, load_options, run_search,
    BacktestConfig, FeedbackGrade, StrategyConfig,
};

fn synthetic_config() -> BacktestConfig {
    BacktestConfig::from_toml(
        r#"
[backtest]
initial_cash = 100000.0
start_date = "2023-01-01"
end_date = "2023-12-31"
symbols = ["AAA", "BBB", "CCC"]

[policy]
allow_short = true

[strategy]
type = "momentum"
lookback = 10

[data]
source = "synthetic"
seed = 42
"#,
    )
    .unwrap()
}

#[test]
fn ranking_is_deterministic_and_sorted() {
    let config = synthetic_config();
    let loaded = load_bars(
        &config.backtest.symbols,
        &config.data,
        &load_options(&config).unwrap(),
    )
    .unwrap();
    let candidates = default_candidates();

    let a = run_search(&config, &candidates, &loaded.feed, &loaded.dataset_hash, true);
    let b = run_search(&config, &candidates, &loaded.feed, &loaded.dataset_hash, true);

    assert!(a.failures.is_empty());
    assert_eq!(a.entries.len(), candidates.len());
    let names_a: Vec<&str> = a.entries.iter().map(|e| e.name.as_str()).collect();
    let names_b: Vec<&str> = b.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names_a, names_b);

    assert!(a.entries.windows(2).all(|w| {
        w[0].result.summary.sharpe_ratio >= w[1].result.summary.sharpe_ratio
    }));
    let best = a.best().unwrap();
    assert_eq!(
        best.grade,
        FeedbackGrade::from_sharpe(best.result.summary.sharpe_ratio)
    );

    let md = generate_search_report(&a);
    assert!(md.contains(&format!("Best: **{}**", best.name)));
}

#[test]
fn failing_candidates_are_reported_not_fatal() {
    let config = synthetic_config();
    let loaded = load_bars(
        &config.backtest.symbols,
        &config.data,
        &load_options(&config).unwrap(),
    )
    .unwrap();
    let candidates = vec![
        StrategyConfig::Momentum { lookback: 5 },
        StrategyConfig::ScoreFile {
            path: "/nonexistent/scores.csv".into(),
            name: Some("missing".into()),
        },
    ];
    let report = run_search(&config, &candidates, &loaded.feed, &loaded.dataset_hash, true);
    assert_eq!(report.entries.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].name, "missing");
}

proptest! {
    #[test]
    fn grade_is_monotonic_in_sharpe(a in -5.0..5.0_f64, b in -5.0..5.0_f64) {
        let (lo, hi) = (a.min(b), a.max(b));
        prop_assert!(FeedbackGrade::from_sharpe(lo) <= FeedbackGrade::from_sharpe(hi));
    }
}
