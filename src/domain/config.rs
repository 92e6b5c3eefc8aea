//! Simulation parameters and their validation.
//!
//! [`SimulationConfig`] is fully populated by the caller; nothing here
//! supplies defaults. [`SimulationConfig::validate`] rejects values a run
//! cannot honor, naming the INI section and key each field is read from.

use crate::domain::error::RsitraderError;
use crate::domain::execution::CostModel;
use crate::domain::indicator::{RsiSmoothing, TrendFilter};
use crate::domain::series::IndicatorParams;
use std::fmt;
use std::str::FromStr;

/// When a signal observed at a close is filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionTiming {
    /// Fill at the close of the signal bar.
    SameDay,
    /// Fill at the open of the instrument's next bar.
    NextOpen,
}

impl fmt::Display for ExecutionTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionTiming::SameDay => write!(f, "same_day"),
            ExecutionTiming::NextOpen => write!(f, "next_open"),
        }
    }
}

impl FromStr for ExecutionTiming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "same_day" | "close" => Ok(ExecutionTiming::SameDay),
            "next_open" | "open" => Ok(ExecutionTiming::NextOpen),
            other => Err(format!(
                "unknown execution timing '{}', expected same_day or next_open",
                other
            )),
        }
    }
}

/// Share of equity given to each new position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Allocation {
    /// `1 / max_positions`.
    EqualWeight,
    Fixed(f64),
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Allocation::EqualWeight => write!(f, "equal"),
            Allocation::Fixed(fraction) => write!(f, "{}", fraction),
        }
    }
}

impl FromStr for Allocation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().to_lowercase();
        match trimmed.as_str() {
            "equal" | "equal_weight" => Ok(Allocation::EqualWeight),
            other => other
                .parse::<f64>()
                .map(Allocation::Fixed)
                .map_err(|_| format!("expected 'equal' or a fraction, got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub initial_capital: f64,
    pub oscillator_window: usize,
    pub oscillator_smoothing: RsiSmoothing,
    pub trend_window: usize,
    pub trend_filter: TrendFilter,
    /// Enter at or below this oscillator value.
    pub buy_threshold: f64,
    /// Exit at or above this oscillator value.
    pub sell_threshold: f64,
    pub max_positions: usize,
    /// Trading days.
    pub max_holding_days: u32,
    /// Calendar days.
    pub cooldown_days: u32,
    pub allocation: Allocation,
    pub costs: CostModel,
    pub min_trade_notional: f64,
    pub execution: ExecutionTiming,
    pub liquidate_at_end: bool,
}

impl SimulationConfig {
    pub fn indicator_params(&self) -> IndicatorParams {
        IndicatorParams {
            oscillator_window: self.oscillator_window,
            smoothing: self.oscillator_smoothing,
            trend_window: self.trend_window,
            trend_filter: self.trend_filter,
        }
    }

    pub fn allocation_fraction(&self) -> f64 {
        match self.allocation {
            Allocation::EqualWeight => 1.0 / self.max_positions.max(1) as f64,
            Allocation::Fixed(fraction) => fraction,
        }
    }

    pub fn validate(&self) -> Result<(), RsitraderError> {
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(RsitraderError::invalid(
                "backtest",
                "initial_capital",
                "initial_capital must be positive",
            ));
        }

        if self.oscillator_window == 0 {
            return Err(RsitraderError::invalid(
                "strategy",
                "oscillator_window",
                "window must be at least 1",
            ));
        }
        if self.trend_window == 0 {
            return Err(RsitraderError::invalid(
                "strategy",
                "trend_window",
                "window must be at least 1",
            ));
        }

        validate_threshold("buy_threshold", self.buy_threshold)?;
        validate_threshold("sell_threshold", self.sell_threshold)?;
        if self.buy_threshold >= self.sell_threshold {
            return Err(RsitraderError::invalid(
                "strategy",
                "buy_threshold",
                "buy_threshold must be below sell_threshold",
            ));
        }

        if self.max_positions == 0 {
            return Err(RsitraderError::invalid(
                "strategy",
                "max_positions",
                "max_positions must be at least 1",
            ));
        }
        if self.max_holding_days == 0 {
            return Err(RsitraderError::invalid(
                "strategy",
                "max_holding_days",
                "max_holding_days must be at least 1",
            ));
        }

        if let Allocation::Fixed(fraction) = self.allocation {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(RsitraderError::invalid(
                    "strategy",
                    "allocation",
                    "allocation must be in (0, 1]",
                ));
            }
        }

        validate_rate("commission_rate", self.costs.commission_rate)?;
        validate_rate("tax_rate", self.costs.tax_rate)?;
        validate_rate("slippage_rate", self.costs.slippage_rate)?;
        if self.costs.sell_cost_rate() >= 1.0 {
            return Err(RsitraderError::invalid(
                "costs",
                "commission_rate",
                "combined sell costs must be below 100%",
            ));
        }

        if !(self.min_trade_notional.is_finite() && self.min_trade_notional >= 0.0) {
            return Err(RsitraderError::invalid(
                "costs",
                "min_trade_notional",
                "min_trade_notional must be non-negative",
            ));
        }

        Ok(())
    }
}

fn validate_threshold(key: &str, value: f64) -> Result<(), RsitraderError> {
    if !(0.0..=100.0).contains(&value) {
        return Err(RsitraderError::invalid(
            "strategy",
            key,
            format!("{} must be between 0 and 100", key),
        ));
    }
    Ok(())
}

fn validate_rate(key: &str, value: f64) -> Result<(), RsitraderError> {
    if !(value.is_finite() && value >= 0.0) {
        return Err(RsitraderError::invalid(
            "costs",
            key,
            format!("{} must be non-negative", key),
        ));
    }
    Ok(())
}
