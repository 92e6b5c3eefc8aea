//! Open positions and closed trades.

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub code: String,
    pub quantity: i64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    /// Trading days of this instrument elapsed since the entry date.
    pub days_held: u32,
    pub mark_price: f64,
    /// Cash paid on entry, costs included.
    pub cost_basis: f64,
}

impl Position {
    pub fn market_value(&self) -> f64 {
        self.quantity as f64 * self.mark_price
    }

    pub fn unrealized_pnl(&self) -> f64 {
        self.market_value() - self.cost_basis
    }

    /// Update the mark; `traded` advances the holding clock for bars after entry.
    pub fn mark(&mut self, date: NaiveDate, price: f64, traded: bool) {
        self.mark_price = price;
        if traded && date > self.entry_date {
            self.days_held += 1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExitReason {
    /// Oscillator reached the sell threshold.
    Signal,
    /// Held for the maximum number of trading days.
    MaxHoldingPeriod,
    /// Closed at the end of the run on request.
    Liquidation,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Signal => write!(f, "signal"),
            ExitReason::MaxHoldingPeriod => write!(f, "max_holding"),
            ExitReason::Liquidation => write!(f, "liquidation"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub code: String,
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub holding_days: u32,
    pub exit_reason: ExitReason,
}

impl Trade {
    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }
}
