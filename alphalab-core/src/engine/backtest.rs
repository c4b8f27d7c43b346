//! Backtest loop: the single-threaded event dispatcher.
//!
//! One tick at a time: advance the feed, enqueue a Market event per symbol
//! with a new bar, then drain the queue until empty. Every event produced
//! while handling a tick is processed before the next tick begins.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use chrono::{DateTime, Utc};

use super::cancel::CancelToken;
use super::execution::ExecutionSimulator;
use super::portfolio::Portfolio;
use super::queue::EventQueue;
use crate::analysis::{PerformanceAnalyzer, PerformanceSummary};
use crate::data::MarketDataFeed;
use crate::domain::{EquityPoint, Event, FillEvent, OrderEvent, Position, SignalEvent};
use crate::error::{KernelError, RecoveredError};
use crate::signals::{ScoreThresholds, Strategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    /// Waiting for the next tick.
    Running,
    /// Processing the events of the current tick.
    Draining,
    /// Feed exhausted, cancelled, or halted by a fatal error.
    Finished,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    pub equity_curve: Vec<EquityPoint>,
    pub fills: Vec<FillEvent>,
    pub orders: Vec<OrderEvent>,
    pub recovered: Vec<RecoveredError>,
    pub summary: PerformanceSummary,
    pub ticks: usize,
    pub stopped_early: bool,
    pub final_cash: f64,
    pub total_commission: f64,
    pub realized_pnl: f64,
    pub positions: BTreeMap<String, Position>,
}

pub struct BacktestLoop<F, S> {
    feed: F,
    strategy: S,
    portfolio: Portfolio,
    execution: ExecutionSimulator,
    thresholds: ScoreThresholds,
    analyzer: PerformanceAnalyzer,
    queue: EventQueue,
    cancel: CancelToken,
    state: LoopState,
    ticks: usize,
    stopped_early: bool,
    orders: Vec<OrderEvent>,
    fills: Vec<FillEvent>,
    recovered: Vec<RecoveredError>,
}

impl<F: MarketDataFeed, S: Strategy> BacktestLoop<F, S> {
    pub fn new(feed: F, strategy: S, portfolio: Portfolio, execution: ExecutionSimulator) -> Self {
        Self {
            feed,
            strategy,
            portfolio,
            execution,
            thresholds: ScoreThresholds::default(),
            analyzer: PerformanceAnalyzer::default(),
            queue: EventQueue::new(),
            cancel: CancelToken::new(),
            state: LoopState::Running,
            ticks: 0,
            stopped_early: false,
            orders: Vec::new(),
            fills: Vec::new(),
            recovered: Vec::new(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: ScoreThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_analyzer(mut self, analyzer: PerformanceAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the run at the next tick boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn ticks(&self) -> usize {
        self.ticks
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn feed(&self) -> &F {
        &self.feed
    }

    /// Process one tick. Returns the state after the tick.
    ///
    /// A fatal error halts the loop: the state becomes `Finished`, pending
    /// events are discarded and the error is returned.
    pub fn step(&mut self) -> Result<LoopState, KernelError> {
        if self.state == LoopState::Finished {
            return Ok(LoopState::Finished);
        }
        if self.cancel.is_cancelled() {
            info!(ticks = self.ticks, "backtest cancelled");
            self.stopped_early = true;
            self.state = LoopState::Finished;
            return Ok(self.state);
        }

        let Some(updated) = self.feed.advance() else {
            self.state = LoopState::Finished;
            return Ok(self.state);
        };
        self.ticks += 1;
        for symbol in updated {
            self.queue.push(Event::market(symbol));
        }

        self.state = LoopState::Draining;
        if let Err(err) = self.drain() {
            self.queue.clear();
            self.state = LoopState::Finished;
            return Err(err);
        }

        self.state = if self.feed.is_exhausted() {
            LoopState::Finished
        } else {
            LoopState::Running
        };
        Ok(self.state)
    }

    /// Step until the feed is exhausted or the run is cancelled.
    pub fn run(&mut self) -> Result<RunOutput, KernelError> {
        info!(
            strategy = self.strategy.name(),
            symbols = self.feed.symbols().len(),
            initial_cash = self.portfolio.initial_cash(),
            "backtest started"
        );
        while self.step()? != LoopState::Finished {}

        let output = self.output();
        info!(
            ticks = output.ticks,
            fills = output.fills.len(),
            recovered = output.recovered.len(),
            total_return = output.summary.total_return,
            sharpe = output.summary.sharpe_ratio,
            "backtest finished"
        );
        Ok(output)
    }

    /// Snapshot of results so far.
    pub fn output(&self) -> RunOutput {
        let equity_curve = self.portfolio.equity_curve().to_vec();
        RunOutput {
            summary: self.analyzer.summarize(&equity_curve),
            equity_curve,
            fills: self.fills.clone(),
            orders: self.orders.clone(),
            recovered: self.recovered.clone(),
            ticks: self.ticks,
            stopped_early: self.stopped_early,
            final_cash: self.portfolio.cash(),
            total_commission: self.portfolio.total_commission(),
            realized_pnl: self.portfolio.realized_pnl(),
            positions: self.portfolio.positions().clone(),
        }
    }

    fn drain(&mut self) -> Result<(), KernelError> {
        while let Some(event) = self.queue.pop() {
            debug!(kind = event.kind(), symbol = event.symbol(), "dispatch");
            self.dispatch(event)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, event: Event) -> Result<(), KernelError> {
        match event {
            Event::Market { symbol } => {
                let bar = self
                    .feed
                    .latest_bar(&symbol)
                    .cloned()
                    .ok_or_else(|| KernelError::invalid_order(&symbol, "market event without a bar"))?;
                self.portfolio.on_market(&bar)?;

                let scored = self
                    .strategy
                    .score(&symbol, self.feed.history(&symbol))
                    .and_then(|score| score.map(|s| self.thresholds.direction(s)).transpose());
                match scored {
                    Ok(Some(direction)) => self.queue.push(Event::Signal(SignalEvent {
                        symbol,
                        timestamp: bar.timestamp,
                        direction,
                    })),
                    Ok(None) => {}
                    Err(err) => self.absorb(err.into_kernel(&symbol), bar.timestamp)?,
                }
            }
            Event::Signal(signal) => {
                match self
                    .portfolio
                    .on_signal(&signal, self.execution.commission_schedule())
                {
                    Ok(Some(order)) => self.queue.push(Event::Order(order)),
                    Ok(None) => {}
                    Err(err) => self.absorb(err, signal.timestamp)?,
                }
            }
            Event::Order(order) => {
                let fill = self.execution.execute(&order, &self.feed)?;
                self.orders.push(order);
                self.queue.push(Event::Fill(fill));
            }
            Event::Fill(fill) => {
                self.portfolio.on_fill(&fill)?;
                self.fills.push(fill);
            }
        }
        Ok(())
    }

    /// Record a recoverable error, or hand a fatal one back to the caller.
    fn absorb(&mut self, err: KernelError, timestamp: DateTime<Utc>) -> Result<(), KernelError> {
        let Some(kind) = err.recovered_kind() else {
            return Err(err);
        };
        let symbol = match &err {
            KernelError::InsufficientFunds { symbol, .. }
            | KernelError::ScoringFailure { symbol, .. } => symbol.clone(),
            _ => String::new(),
        };
        warn!(%symbol, %timestamp, error = %err, "recovered");
        self.recovered.push(RecoveredError {
            timestamp,
            symbol,
            kind,
            detail: err.to_string(),
        });
        Ok(())
    }
}
