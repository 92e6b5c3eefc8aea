//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values aligned to the input bars
//! - `TrendFilter`: the moving-average family used to gate entries

pub mod ema;
pub mod rsi;
pub mod sma;

use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;

pub use rsi::RsiSmoothing;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: f64,
}

impl IndicatorPoint {
    pub(crate) fn warmup(date: NaiveDate) -> Self {
        IndicatorPoint {
            date,
            valid: false,
            value: 0.0,
        }
    }

    pub(crate) fn ready(date: NaiveDate, value: f64) -> Self {
        IndicatorPoint {
            date,
            valid: true,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorType {
    Rsi {
        period: usize,
        smoothing: RsiSmoothing,
    },
    Sma(usize),
    Ema(usize),
}

/// Indicator values aligned index-for-index with the bars they were computed from.
#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// The value at `index`, or `None` during warmup or past the end.
    pub fn value_at(&self, index: usize) -> Option<f64> {
        self.values
            .get(index)
            .filter(|p| p.valid)
            .map(|p| p.value)
    }

    /// Index of the first valid point.
    pub fn first_valid(&self) -> Option<usize> {
        self.values.iter().position(|p| p.valid)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Rsi { period, smoothing } => write!(f, "RSI({},{})", period, smoothing),
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
        }
    }
}

/// Moving-average family for the trend filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrendFilter {
    Sma,
    Ema,
}

impl TrendFilter {
    pub fn compute(self, bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
        match self {
            TrendFilter::Sma => sma::calculate_sma(bars, period),
            TrendFilter::Ema => ema::calculate_ema(bars, period),
        }
    }
}

impl fmt::Display for TrendFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendFilter::Sma => write!(f, "sma"),
            TrendFilter::Ema => write!(f, "ema"),
        }
    }
}

impl FromStr for TrendFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sma" => Ok(TrendFilter::Sma),
            "ema" => Ok(TrendFilter::Ema),
            other => Err(format!("unknown trend filter '{}', expected sma or ema", other)),
        }
    }
}
