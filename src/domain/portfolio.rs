//! Portfolio state and equity tracking.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::cooldown::CooldownLedger;
use super::position::{Position, Trade};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
    pub cash: f64,
    pub open_positions: usize,
}

/// Cash, open positions and the run's accumulated history.
///
/// Positions are kept in a `BTreeMap` so every walk over them happens in
/// code order and repeated runs sum floating-point values identically.
#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: BTreeMap<String, Position>,
    pub cooldowns: CooldownLedger,
    pub closed_trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            positions: BTreeMap::new(),
            cooldowns: CooldownLedger::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.insert(position.code.clone(), position);
    }

    pub fn get_position(&self, code: &str) -> Option<&Position> {
        self.positions.get(code)
    }

    pub fn has_position(&self, code: &str) -> bool {
        self.positions.contains_key(code)
    }

    pub fn remove_position(&mut self, code: &str) -> Option<Position> {
        self.positions.remove(code)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.closed_trades.push(trade);
    }

    /// Appends a snapshot of the current cash and marks.
    pub fn record_equity(&mut self, date: NaiveDate) {
        let equity = self.total_equity();
        self.equity_curve.push(EquityPoint {
            date,
            equity,
            cash: self.cash,
            open_positions: self.positions.len(),
        });
    }

    pub fn positions_value(&self) -> f64 {
        self.positions.values().map(Position::market_value).sum()
    }

    pub fn total_equity(&self) -> f64 {
        self.cash + self.positions_value()
    }

    /// Marks every open position for `date`.
    ///
    /// `close_for` returns the instrument's close when it traded on `date`;
    /// otherwise the last mark is carried forward and the holding clock
    /// does not advance.
    pub fn mark_to_market<F>(&mut self, date: NaiveDate, close_for: F)
    where
        F: Fn(&str) -> Option<f64>,
    {
        for (code, position) in self.positions.iter_mut() {
            match close_for(code.as_str()) {
                Some(close) => position.mark(date, close, true),
                None => {
                    let carried = position.mark_price;
                    position.mark(date, carried, false);
                }
            }
        }
    }
}
