//! Performance summary of a finished run.
//!
//! Every statistic is derived from the equity curve, the trade log and the
//! initial capital. Percentages are expressed in percent (10.0 is 10%).

use super::portfolio::EquityPoint;
use super::position::{ExitReason, Trade};
use std::collections::BTreeMap;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceSummary {
    pub initial_capital: f64,
    pub final_equity: f64,
    /// `(final / initial - 1) * 100`.
    pub total_return: f64,
    pub annualized_return: f64,
    /// Most negative peak-to-trough decline in percent, `<= 0`.
    pub max_drawdown: f64,
    /// Longest run of snapshots below the running peak.
    pub max_drawdown_duration: usize,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub total_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    /// Winning trades over all trades in percent; 0 without trades.
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Trading days.
    pub avg_holding_days: f64,
    pub signal_exits: usize,
    pub max_holding_exits: usize,
    pub liquidation_exits: usize,
}

impl PerformanceSummary {
    pub fn compute(
        equity_curve: &[EquityPoint],
        trades: &[Trade],
        initial_capital: f64,
        risk_free_rate: f64,
    ) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let growth = if initial_capital > 0.0 {
            final_equity / initial_capital
        } else {
            1.0
        };
        let total_return = (growth - 1.0) * 100.0;

        let years = equity_curve.len() as f64 / TRADING_DAYS_PER_YEAR;
        let annualized_return = if years > 0.0 && growth > 0.0 {
            (growth.powf(1.0 / years) - 1.0) * 100.0
        } else if years > 0.0 {
            -100.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(equity_curve);

        let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
        let (sharpe_ratio, sortino_ratio) = compute_risk_adjusted(equity_curve, daily_rf);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_holding_days = 0u64;
        let mut signal_exits = 0usize;
        let mut max_holding_exits = 0usize;
        let mut liquidation_exits = 0usize;

        for trade in trades {
            let pnl = trade.pnl;
            if trade.is_win() {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else if trade.is_loss() {
                trades_lost += 1;
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            } else {
                trades_breakeven += 1;
            }

            total_holding_days += u64::from(trade.holding_days);

            match trade.exit_reason {
                ExitReason::Signal => signal_exits += 1,
                ExitReason::MaxHoldingPeriod => max_holding_exits += 1,
                ExitReason::Liquidation => liquidation_exits += 1,
            }
        }

        let total_trades = trades.len();
        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let avg_win = if trades_won > 0 {
            total_wins / trades_won as f64
        } else {
            0.0
        };

        let avg_loss = if trades_lost > 0 {
            total_losses / trades_lost as f64
        } else {
            0.0
        };

        let avg_holding_days = if total_trades > 0 {
            total_holding_days as f64 / total_trades as f64
        } else {
            0.0
        };

        PerformanceSummary {
            initial_capital,
            final_equity,
            total_return,
            annualized_return,
            max_drawdown,
            max_drawdown_duration,
            sharpe_ratio,
            sortino_ratio,
            total_trades,
            trades_won,
            trades_lost,
            trades_breakeven,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            largest_win,
            largest_loss,
            avg_holding_days,
            signal_exits,
            max_holding_exits,
            liquidation_exits,
        }
    }
}

/// Per-code trade breakdown.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeResult {
    pub code: String,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub total_pnl: f64,
    /// Percent.
    pub win_rate: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl CodeResult {
    /// One entry per traded code, in code order.
    pub fn compute_per_code(trades: &[Trade]) -> Vec<CodeResult> {
        let mut by_code: BTreeMap<&str, CodeResult> = BTreeMap::new();

        for trade in trades {
            let entry = by_code
                .entry(trade.code.as_str())
                .or_insert_with(|| CodeResult {
                    code: trade.code.clone(),
                    total_trades: 0,
                    winning_trades: 0,
                    losing_trades: 0,
                    total_pnl: 0.0,
                    win_rate: 0.0,
                    largest_win: 0.0,
                    largest_loss: 0.0,
                });

            entry.total_trades += 1;
            entry.total_pnl += trade.pnl;
            if trade.is_win() {
                entry.winning_trades += 1;
                entry.largest_win = entry.largest_win.max(trade.pnl);
            } else if trade.is_loss() {
                entry.losing_trades += 1;
                entry.largest_loss = entry.largest_loss.max(trade.pnl.abs());
            }
        }

        by_code
            .into_values()
            .map(|mut result| {
                result.win_rate = result.winning_trades as f64 / result.total_trades as f64 * 100.0;
                result
            })
            .collect()
    }
}

/// Returns (max drawdown in percent, longest drawdown in snapshots).
fn compute_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
    let Some(first) = equity_curve.first() else {
        return (0.0, 0);
    };

    let mut peak = first.equity;
    let mut max_dd = 0.0_f64;
    let mut current_duration = 0usize;
    let mut max_duration = 0usize;

    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            current_duration = 0;
            continue;
        }
        if peak > 0.0 {
            let dd = (point.equity - peak) / peak * 100.0;
            max_dd = max_dd.min(dd);
        }
        current_duration += 1;
        max_duration = max_duration.max(current_duration);
    }

    (max_dd, max_duration)
}

fn compute_risk_adjusted(equity_curve: &[EquityPoint], daily_rf: f64) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            let curr = w[1].equity;
            if prev > 0.0 { (curr - prev) / prev } else { 0.0 }
        })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;

    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let excess_return = mean - daily_rf;

    let sharpe = if stddev > 0.0 {
        (excess_return / stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    // semi-deviation below the risk-free rate, over all periods
    let downside_sum: f64 = returns
        .iter()
        .filter(|&&r| r < daily_rf)
        .map(|&r| (r - daily_rf).powi(2))
        .sum();
    let downside_stddev = (downside_sum / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        (excess_return / downside_stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    };

    (sharpe, sortino)
}
