//! Instrument series, aligned signal frames and the unified timeline.
//!
//! An [`InstrumentSeries`] owns the raw bars of one instrument. A
//! [`SignalFrame`] borrows a series and carries the oscillator and trend
//! values computed for one set of [`IndicatorParams`], so many simulation
//! runs can share the same bars without copying them.

use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::{IndicatorSeries, RsiSmoothing, TrendFilter};
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct InstrumentSeries {
    pub code: String,
    pub bars: Vec<OhlcvBar>,
    pub date_index: HashMap<NaiveDate, usize>,
}

impl InstrumentSeries {
    /// Bars are sorted by date; a repeated date keeps its first bar.
    pub fn new(code: String, mut bars: Vec<OhlcvBar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            code,
            bars,
            date_index,
        }
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&OhlcvBar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    pub fn get_bar_index(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }
}

pub fn build_unified_timeline(series: &[InstrumentSeries]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = series
        .iter()
        .flat_map(|s| s.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}

/// Indicator parameters shared by every run that can reuse the same frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndicatorParams {
    pub oscillator_window: usize,
    pub smoothing: RsiSmoothing,
    pub trend_window: usize,
    pub trend_filter: TrendFilter,
}

impl IndicatorParams {
    /// Bars needed before both indicators are valid.
    pub fn warmup_bars(&self) -> usize {
        (self.oscillator_window + 1).max(self.trend_window)
    }
}

/// One instrument's bars with aligned oscillator and trend values.
#[derive(Debug, Clone)]
pub struct SignalFrame<'a> {
    pub series: &'a InstrumentSeries,
    pub oscillator: IndicatorSeries,
    pub trend: IndicatorSeries,
}

/// Everything the evaluator sees for one instrument on one date.
#[derive(Debug, Clone, Copy)]
pub struct SignalPoint<'a> {
    pub bar: &'a OhlcvBar,
    pub oscillator: Option<f64>,
    pub trend: Option<f64>,
}

impl SignalPoint<'_> {
    /// Both indicators are past warmup and the bar can be traded.
    pub fn is_actionable(&self) -> bool {
        self.oscillator.is_some() && self.trend.is_some() && self.bar.is_tradable()
    }
}

impl<'a> SignalFrame<'a> {
    pub fn compute(series: &'a InstrumentSeries, params: &IndicatorParams) -> Self {
        SignalFrame {
            series,
            oscillator: calculate_rsi(&series.bars, params.oscillator_window, params.smoothing),
            trend: params
                .trend_filter
                .compute(&series.bars, params.trend_window),
        }
    }

    pub fn point_at(&self, date: NaiveDate) -> Option<SignalPoint<'a>> {
        let index = self.series.get_bar_index(date)?;
        Some(SignalPoint {
            bar: &self.series.bars[index],
            oscillator: self.oscillator.value_at(index),
            trend: self.trend.value_at(index),
        })
    }
}

/// Signal frames for a whole instrument set, looked up by code.
#[derive(Debug, Clone)]
pub struct FrameSet<'a> {
    frames: Vec<SignalFrame<'a>>,
    by_code: BTreeMap<String, usize>,
    params: IndicatorParams,
}

impl<'a> FrameSet<'a> {
    pub fn prepare(series: &'a [InstrumentSeries], params: &IndicatorParams) -> Self {
        let frames: Vec<SignalFrame<'a>> = series
            .iter()
            .map(|s| SignalFrame::compute(s, params))
            .collect();
        let by_code = frames
            .iter()
            .enumerate()
            .map(|(i, f)| (f.series.code.clone(), i))
            .collect();
        FrameSet {
            frames,
            by_code,
            params: *params,
        }
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    pub fn get(&self, code: &str) -> Option<&SignalFrame<'a>> {
        self.by_code.get(code).map(|&i| &self.frames[i])
    }

    pub fn point(&self, code: &str, date: NaiveDate) -> Option<SignalPoint<'a>> {
        self.get(code)?.point_at(date)
    }

    pub fn bar(&self, code: &str, date: NaiveDate) -> Option<&'a OhlcvBar> {
        self.get(code)?.series.get_bar(date)
    }
}
