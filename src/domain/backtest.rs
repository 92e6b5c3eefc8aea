//! Backtest engine and event loop.
//!
//! Walks the unified timeline one date at a time. Per date:
//!
//! 1. Drop expired cooldowns
//! 2. NextOpen only: fill queued exits, then queued entries, at today's open
//! 3. Mark open positions to today's close
//! 4. Evaluate exits, then entries
//! 5. SameDay: fill at today's close. NextOpen: queue for the next bar
//! 6. Append one equity snapshot
//!
//! A run is a pure function of its inputs. Every collection walked here is
//! ordered, so two runs over the same data produce identical results.

use crate::domain::config::{ExecutionTiming, SimulationConfig};
use crate::domain::error::RsitraderError;
use crate::domain::execution::{self, EntryResult};
use crate::domain::portfolio::{EquityPoint, Portfolio};
use crate::domain::position::{ExitReason, Trade};
use crate::domain::series::{FrameSet, InstrumentSeries, build_unified_timeline};
use crate::domain::signal::{evaluate_entries, evaluate_exits};
use crate::domain::universe::UniverseMembership;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub portfolio: Portfolio,
}

impl BacktestResult {
    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.portfolio.equity_curve
    }

    pub fn trades(&self) -> &[Trade] {
        &self.portfolio.closed_trades
    }

    pub fn final_equity(&self) -> f64 {
        self.portfolio
            .equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.portfolio.initial_capital)
    }
}

/// Validate `config`, compute indicators and run one simulation.
///
/// Without a membership table every supplied instrument is eligible on
/// every date.
pub fn run_backtest(
    series: &[InstrumentSeries],
    universe: Option<&UniverseMembership>,
    config: &SimulationConfig,
) -> Result<BacktestResult, RsitraderError> {
    run_backtest_from(series, universe, config, NaiveDate::MIN)
}

/// Like [`run_backtest`], but simulates only dates on or after
/// `start_date`. Earlier bars still feed the indicators, so signals are
/// available from the first simulated date.
pub fn run_backtest_from(
    series: &[InstrumentSeries],
    universe: Option<&UniverseMembership>,
    config: &SimulationConfig,
    start_date: NaiveDate,
) -> Result<BacktestResult, RsitraderError> {
    config.validate()?;

    let frames = FrameSet::prepare(series, &config.indicator_params());
    let mut timeline = build_unified_timeline(series);
    timeline.retain(|date| *date >= start_date);
    let all;
    let universe = match universe {
        Some(u) => u,
        None => {
            all = UniverseMembership::all_of(series);
            &all
        }
    };

    run_prepared(&frames, &timeline, universe, config)
}

/// Run over frames that were already computed for `config`'s indicator
/// parameters. Sweeps share one frame set across many configs this way.
pub fn run_prepared(
    frames: &FrameSet<'_>,
    timeline: &[NaiveDate],
    universe: &UniverseMembership,
    config: &SimulationConfig,
) -> Result<BacktestResult, RsitraderError> {
    config.validate()?;
    if *frames.params() != config.indicator_params() {
        return Err(RsitraderError::invalid(
            "strategy",
            "oscillator_window",
            "signal frames were prepared for different indicator parameters",
        ));
    }

    let mut sim = Simulation::new(frames, config);
    for &date in timeline {
        sim.step(date, universe.eligible(date));
    }

    if config.liquidate_at_end {
        if let Some(&last) = timeline.last() {
            sim.liquidate(last);
        }
    }

    let portfolio = sim.finish();

    info!(
        dates = timeline.len(),
        trades = portfolio.closed_trades.len(),
        open_positions = portfolio.position_count(),
        final_equity = portfolio.total_equity(),
        "backtest complete"
    );

    Ok(BacktestResult { portfolio })
}

struct Simulation<'f, 'a> {
    frames: &'f FrameSet<'a>,
    config: &'f SimulationConfig,
    portfolio: Portfolio,
    /// Exits signalled at a close, filled at the code's next open.
    pending_exits: BTreeMap<String, ExitReason>,
    /// Entries in rank order, filled at the code's next open.
    pending_entries: Vec<String>,
}

impl<'f, 'a> Simulation<'f, 'a> {
    fn new(frames: &'f FrameSet<'a>, config: &'f SimulationConfig) -> Self {
        Simulation {
            frames,
            config,
            portfolio: Portfolio::new(config.initial_capital),
            pending_exits: BTreeMap::new(),
            pending_entries: Vec::new(),
        }
    }

    fn step(&mut self, date: NaiveDate, eligible: &BTreeSet<String>) {
        self.portfolio.cooldowns.purge_expired(date);

        if self.config.execution == ExecutionTiming::NextOpen {
            self.fill_pending(date);
        }

        let frames = self.frames;
        self.portfolio.mark_to_market(date, |code| {
            frames
                .bar(code, date)
                .filter(|bar| bar.is_tradable())
                .map(|bar| bar.close)
        });

        match self.config.execution {
            ExecutionTiming::SameDay => self.trade_at_close(date, eligible),
            ExecutionTiming::NextOpen => self.queue_orders(date, eligible),
        }

        self.portfolio.record_equity(date);
    }

    fn trade_at_close(&mut self, date: NaiveDate, eligible: &BTreeSet<String>) {
        let none = BTreeSet::new();

        let exits = evaluate_exits(&self.portfolio, self.frames, date, self.config, &none);
        for exit in exits {
            if let Some(bar) = self.frames.bar(&exit.code, date) {
                self.exit(&exit.code, bar.close, date, exit.reason);
            }
        }

        let slots = self
            .config
            .max_positions
            .saturating_sub(self.portfolio.position_count());
        let candidates = evaluate_entries(
            &self.portfolio,
            self.frames,
            eligible,
            date,
            self.config,
            &none,
            slots,
        );
        if candidates.is_empty() {
            return;
        }

        // sized once, after the date's exits
        let equity = self.portfolio.total_equity();
        for candidate in candidates {
            if let Some(bar) = self.frames.bar(&candidate.code, date) {
                self.enter(&candidate.code, bar.close, date, equity);
            }
        }
    }

    fn queue_orders(&mut self, date: NaiveDate, eligible: &BTreeSet<String>) {
        let queued_exits: BTreeSet<String> = self.pending_exits.keys().cloned().collect();
        let exits = evaluate_exits(&self.portfolio, self.frames, date, self.config, &queued_exits);
        for exit in exits {
            debug!(%date, code = %exit.code, reason = %exit.reason, "exit queued");
            self.pending_exits.insert(exit.code, exit.reason);
        }

        let staying = self
            .portfolio
            .position_count()
            .saturating_sub(self.pending_exits.len());
        let slots = self
            .config
            .max_positions
            .saturating_sub(staying)
            .saturating_sub(self.pending_entries.len());

        let queued_entries: BTreeSet<String> = self.pending_entries.iter().cloned().collect();
        let candidates = evaluate_entries(
            &self.portfolio,
            self.frames,
            eligible,
            date,
            self.config,
            &queued_entries,
            slots,
        );
        for candidate in candidates {
            debug!(%date, code = %candidate.code, oscillator = candidate.oscillator, "entry queued");
            self.pending_entries.push(candidate.code);
        }
    }

    /// Fill queued orders at today's open. Orders for codes without a
    /// tradable bar today carry forward.
    fn fill_pending(&mut self, date: NaiveDate) {
        let exits = std::mem::take(&mut self.pending_exits);
        for (code, reason) in exits {
            match self.tradable_open(&code, date) {
                Some(open) => self.exit(&code, open, date, reason),
                None => {
                    self.pending_exits.insert(code, reason);
                }
            }
        }

        if self.pending_entries.is_empty() {
            return;
        }

        let equity = self.portfolio.total_equity();
        let entries = std::mem::take(&mut self.pending_entries);
        for code in entries {
            let Some(open) = self.tradable_open(&code, date) else {
                self.pending_entries.push(code);
                continue;
            };
            if self.portfolio.position_count() >= self.config.max_positions {
                debug!(%date, %code, "entry cancelled: no free slot");
                continue;
            }
            self.enter(&code, open, date, equity);
        }
    }

    fn tradable_open(&self, code: &str, date: NaiveDate) -> Option<f64> {
        self.frames
            .bar(code, date)
            .filter(|bar| bar.is_tradable())
            .map(|bar| bar.open)
    }

    fn enter(&mut self, code: &str, price: f64, date: NaiveDate, equity: f64) {
        let target = execution::target_notional(
            equity,
            self.config.allocation_fraction(),
            self.portfolio.cash,
        );
        match execution::enter_long(
            &mut self.portfolio,
            code,
            price,
            date,
            target,
            &self.config.costs,
            self.config.min_trade_notional,
        ) {
            EntryResult::Entered { quantity, cost, .. } => {
                debug!(%date, %code, quantity, price, cost, "entry filled");
            }
            EntryResult::Rejected(reason) => {
                debug!(%date, %code, ?reason, "entry skipped");
            }
        }
    }

    fn exit(&mut self, code: &str, price: f64, date: NaiveDate, reason: ExitReason) {
        if let Some(result) = execution::exit_position(
            &mut self.portfolio,
            code,
            price,
            date,
            reason,
            &self.config.costs,
            self.config.cooldown_days,
        ) {
            debug!(
                %date,
                %code,
                %reason,
                quantity = result.quantity,
                price,
                pnl = result.pnl,
                "exit filled"
            );
        }
    }

    /// Close everything at its last mark and restate the final snapshot.
    fn liquidate(&mut self, date: NaiveDate) {
        let marks: Vec<(String, f64)> = self
            .portfolio
            .positions
            .values()
            .map(|p| (p.code.clone(), p.mark_price))
            .collect();
        for (code, mark) in marks {
            self.exit(&code, mark, date, ExitReason::Liquidation);
        }

        if !self.pending_entries.is_empty() || !self.pending_exits.is_empty() {
            debug!(
                entries = self.pending_entries.len(),
                exits = self.pending_exits.len(),
                "dropping unfilled orders at end of run"
            );
            self.pending_entries.clear();
            self.pending_exits.clear();
        }

        if self.portfolio.equity_curve.last().is_some_and(|p| p.date == date) {
            self.portfolio.equity_curve.pop();
        }
        self.portfolio.record_equity(date);
    }

    fn finish(self) -> Portfolio {
        self.portfolio
    }
}
