#![allow(dead_code)]

use chrono::NaiveDate;
use rsitrader::domain::config::{Allocation, ExecutionTiming, SimulationConfig};
use rsitrader::domain::error::RsitraderError;
use rsitrader::domain::execution::CostModel;
use rsitrader::domain::indicator::{RsiSmoothing, TrendFilter};
pub use rsitrader::domain::ohlcv::OhlcvBar;
use rsitrader::domain::series::InstrumentSeries;
use rsitrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, RsitraderError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(RsitraderError::Data {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(code)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, RsitraderError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Trading day `i` of the test calendar: 2024-01-01 plus `i` days.
pub fn day(i: usize) -> NaiveDate {
    date(2024, 1, 1) + chrono::Duration::days(i as i64)
}

/// One bar per day from [`day`]`(0)`, open equal to close.
pub fn daily_bars(code: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            code: code.to_string(),
            date: day(i),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000,
        })
        .collect()
}

pub fn daily_series(code: &str, closes: &[f64]) -> InstrumentSeries {
    InstrumentSeries::new(code.to_string(), daily_bars(code, closes))
}

/// `count` closes rising by `step` from `start`.
pub fn rising(start: f64, step: f64, count: usize) -> Vec<f64> {
    (0..count).map(|i| start + step * i as f64).collect()
}

/// Rise to 122, dip to 119 then 116 on day 13 (entry signal), hold flat at
/// 116 through day 18, jump to 130 on day 19 (exit signal).
pub fn signal_closes() -> Vec<f64> {
    let mut closes = rising(100.0, 2.0, 12);
    closes.extend([119.0, 116.0, 116.0, 116.0, 116.0, 116.0, 116.0, 130.0]);
    closes
}

/// Entry on day 17, forced loss exit on day 20, then entry signals on
/// day 40 and day 115.
pub fn cooldown_closes() -> Vec<f64> {
    let mut closes = rising(100.0, 2.0, 16);
    closes.extend([127.0, 124.0, 123.0, 122.0, 121.0]);
    extend_rising(&mut closes, 39);
    dip_twice(&mut closes);
    extend_rising(&mut closes, 114);
    dip_twice(&mut closes);
    extend_rising(&mut closes, 121);
    closes
}

fn extend_rising(closes: &mut Vec<f64>, len: usize) {
    while closes.len() < len {
        let last = closes.last().copied().unwrap_or(100.0);
        closes.push(last + 2.0);
    }
}

fn dip_twice(closes: &mut Vec<f64>) {
    let last = closes.last().copied().unwrap_or(100.0);
    closes.push(last - 3.0);
    closes.push(last - 6.0);
}

/// RSI(2) Wilder, SMA(10), buy <= 30, sell >= 70, one position, no costs.
pub fn base_config() -> SimulationConfig {
    SimulationConfig {
        initial_capital: 10_000.0,
        oscillator_window: 2,
        oscillator_smoothing: RsiSmoothing::Wilder,
        trend_window: 10,
        trend_filter: TrendFilter::Sma,
        buy_threshold: 30.0,
        sell_threshold: 70.0,
        max_positions: 1,
        max_holding_days: 50,
        cooldown_days: 90,
        allocation: Allocation::EqualWeight,
        costs: CostModel::free(),
        min_trade_notional: 0.0,
        execution: ExecutionTiming::SameDay,
        liquidate_at_end: false,
    }
}

pub fn market_costs() -> CostModel {
    CostModel {
        commission_rate: 0.00015,
        tax_rate: 0.0023,
        slippage_rate: 0.001,
    }
}
