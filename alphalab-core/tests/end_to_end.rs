//! End-to-end runs through the full Market → Signal → Order → Fill chain.

use chrono::{DateTime, Duration, TimeZone, Utc};

use alphalab_core::data::HistoricalFeed;
use alphalab_core::domain::{Bar, OrderSide, SignalDirection};
use alphalab_core::engine::{
    BacktestLoop, CancelToken, ExecutionSimulator, LoopState, Portfolio, PortfolioConfig,
};
use alphalab_core::signals::{Momentum, Score, ScoreSeries, ScoringError, Strategy};
use alphalab_core::{KernelError, RecoveredKind};

// ── Helpers ──────────────────────────────────────────────────────────

fn t(day: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(day)
}

fn bar(symbol: &str, day: i64, close: f64) -> Bar {
    Bar::new(symbol, t(day), close, close, close, close, 10_000.0)
}

fn portfolio(cash: f64, shares: u64) -> Portfolio {
    Portfolio::new(cash, t(0), PortfolioConfig::fixed_shares(shares))
}

/// Long at 100 on day 1, Exit at 110 on day 2.
fn long_then_exit() -> (HistoricalFeed, ScoreSeries) {
    let feed = HistoricalFeed::from_bars(vec![bar("X", 1, 100.0), bar("X", 2, 110.0)]).unwrap();
    let mut scores = ScoreSeries::new("scripted");
    scores.insert("X", t(1), Score::Directive(SignalDirection::Long));
    scores.insert("X", t(2), Score::Directive(SignalDirection::Exit));
    (feed, scores)
}

struct NanScore;

impl Strategy for NanScore {
    fn name(&self) -> &str {
        "nan"
    }
    fn score(&self, _: &str, _: &[Bar]) -> Result<Option<Score>, ScoringError> {
        Ok(Some(Score::Value(f64::NAN)))
    }
}

// ── Reference scenario ───────────────────────────────────────────────

#[test]
fn long_then_exit_reference_scenario() {
    let (feed, scores) = long_then_exit();
    let out = BacktestLoop::new(feed, scores, portfolio(100_000.0, 100), ExecutionSimulator::naive())
        .run()
        .unwrap();

    assert_eq!(out.orders.len(), 2);
    assert_eq!(out.fills.len(), 2);

    let buy = &out.fills[0];
    assert_eq!((buy.side, buy.quantity, buy.fill_cost), (OrderSide::Buy, 100, 100.0));
    assert_eq!(buy.commission, 1.30);
    let sell = &out.fills[1];
    assert_eq!((sell.side, sell.quantity, sell.fill_cost), (OrderSide::Sell, 100, 110.0));
    assert_eq!(sell.commission, 1.30);

    assert!((out.final_cash - 100_997.40).abs() < 1e-6);
    assert!(out.positions.is_empty());
    assert!((out.total_commission - 2.60).abs() < 1e-12);
    assert!((out.realized_pnl - 1_000.0).abs() < 1e-9);

    let equity: Vec<f64> = out.equity_curve.iter().map(|p| p.total_equity).collect();
    assert_eq!(equity.len(), 3);
    assert!((equity[0] - 100_000.0).abs() < 1e-9);
    assert!((equity[1] - 99_998.70).abs() < 1e-6);
    assert!((equity[2] - 100_997.40).abs() < 1e-6);
    assert!((out.summary.total_return - 0.009974).abs() < 1e-9);
    assert_eq!(out.summary.display_rows()[0].1, "1.00%");
}

#[test]
fn empty_feed_yields_empty_curve_and_sentinels() {
    let feed = HistoricalFeed::from_bars(Vec::new()).unwrap();
    let out = BacktestLoop::new(feed, Momentum::new(3), portfolio(100_000.0, 100), ExecutionSimulator::naive())
        .run()
        .unwrap();
    assert!(out.equity_curve.is_empty());
    assert_eq!(out.ticks, 0);
    assert_eq!(out.summary.total_return, 0.0);
    assert_eq!(out.summary.sharpe_ratio, 0.0);
    assert_eq!(out.summary.max_drawdown, 0.0);
    assert_eq!(out.summary.drawdown_duration, 0);
    assert_eq!(out.final_cash, 100_000.0);
}

// ── Multi-symbol ticks ───────────────────────────────────────────────

#[test]
fn one_equity_point_per_tick_across_symbols() {
    let feed = HistoricalFeed::from_bars(vec![
        bar("B", 1, 50.0),
        bar("A", 1, 100.0),
        bar("A", 2, 101.0),
        bar("B", 3, 52.0),
        bar("A", 3, 99.0),
    ])
    .unwrap();
    let mut scores = ScoreSeries::new("both_long");
    scores.insert("A", t(1), Score::Value(1.0));
    scores.insert("B", t(1), Score::Value(1.0));
    let out = BacktestLoop::new(feed, scores, portfolio(100_000.0, 10), ExecutionSimulator::naive())
        .run()
        .unwrap();

    assert_eq!(out.ticks, 3);
    assert_eq!(out.equity_curve.len(), 4);
    assert!(out
        .equity_curve
        .windows(2)
        .all(|w| w[0].timestamp < w[1].timestamp));
    // Symbols are dispatched in sorted order within a tick.
    assert_eq!(out.fills[0].symbol, "A");
    assert_eq!(out.fills[1].symbol, "B");

    // Last point: cash + 10 * 99 + 10 * 52.
    let last = out.equity_curve.last().unwrap();
    let expected = out.final_cash + 10.0 * 99.0 + 10.0 * 52.0;
    assert!((last.total_equity - expected).abs() < 1e-9);
}

// ── Recovered and fatal errors ───────────────────────────────────────

#[test]
fn scoring_failures_are_recovered() {
    let feed = HistoricalFeed::from_bars((1..=3).map(|d| bar("X", d, 100.0))).unwrap();
    let out = BacktestLoop::new(feed, NanScore, portfolio(100_000.0, 100), ExecutionSimulator::naive())
        .run()
        .unwrap();
    assert_eq!(out.ticks, 3);
    assert_eq!(out.recovered.len(), 3);
    assert!(out
        .recovered
        .iter()
        .all(|r| r.kind == RecoveredKind::ScoringFailure && r.symbol == "X"));
    assert!(out.fills.is_empty());
    assert_eq!(out.equity_curve.len(), 4);
}

#[test]
fn insufficient_funds_rejects_order_and_continues() {
    let (feed, scores) = long_then_exit();
    let out = BacktestLoop::new(feed, scores, portfolio(5_000.0, 100), ExecutionSimulator::naive())
        .run()
        .unwrap();
    assert_eq!(out.recovered.len(), 1);
    assert_eq!(out.recovered[0].kind, RecoveredKind::InsufficientFunds);
    assert_eq!(out.recovered[0].timestamp, t(1));
    assert!(out.orders.is_empty());
    assert!(out.fills.is_empty());
    assert_eq!(out.final_cash, 5_000.0);
    assert_eq!(out.ticks, 2);
}

#[test]
fn same_tick_buys_cannot_overdraw_cash() {
    let feed = HistoricalFeed::from_bars(vec![bar("A", 1, 100.0), bar("B", 1, 100.0)]).unwrap();
    let mut scores = ScoreSeries::new("both_long");
    scores.insert("A", t(1), Score::Directive(SignalDirection::Long));
    scores.insert("B", t(1), Score::Directive(SignalDirection::Long));
    let out = BacktestLoop::new(feed, scores, portfolio(15_000.0, 100), ExecutionSimulator::naive())
        .run()
        .unwrap();

    assert_eq!(out.fills.len(), 1);
    assert_eq!(out.fills[0].symbol, "A");
    assert_eq!(out.recovered.len(), 1);
    assert_eq!(out.recovered[0].kind, RecoveredKind::InsufficientFunds);
    assert_eq!(out.recovered[0].symbol, "B");
    assert!((out.final_cash - 4_998.70).abs() < 1e-6);
    assert!(out.final_cash >= 0.0);
}

#[test]
fn bar_before_start_halts_the_run() {
    let (feed, scores) = long_then_exit();
    let late_start = Portfolio::new(100_000.0, t(5), PortfolioConfig::fixed_shares(100));
    let mut bt = BacktestLoop::new(feed, scores, late_start, ExecutionSimulator::naive());
    let err = bt.run().unwrap_err();
    assert!(matches!(err, KernelError::OutOfOrderBar { .. }));
    assert!(err.is_fatal());
    assert_eq!(bt.state(), LoopState::Finished);
}

// ── Cancellation ─────────────────────────────────────────────────────

#[test]
fn cancelled_before_start_processes_nothing() {
    let (feed, scores) = long_then_exit();
    let token = CancelToken::new();
    token.cancel();
    let out = BacktestLoop::new(feed, scores, portfolio(100_000.0, 100), ExecutionSimulator::naive())
        .with_cancel_token(token)
        .run()
        .unwrap();
    assert!(out.stopped_early);
    assert_eq!(out.ticks, 0);
    assert!(out.equity_curve.is_empty());
}

#[test]
fn identical_inputs_give_identical_outputs() {
    let run = || {
        let feed = HistoricalFeed::from_bars(
            (1..=60).map(|d| bar("X", d, 100.0 + ((d as f64) * 0.7).sin() * 5.0)),
        )
        .unwrap();
        BacktestLoop::new(feed, Momentum::new(5), portfolio(100_000.0, 50), ExecutionSimulator::naive())
            .run()
            .unwrap()
    };
    assert_eq!(run(), run());
}
