//! Universe resolution and validation.
//!
//! [`UniverseMembership`] answers "which codes may be bought on this date",
//! either from a single static set or from a year-keyed membership table so
//! that historical runs only see the index constituents of their time.
//! [`validate_universe`] loads the requested codes through a [`DataPort`]
//! and drops those without enough history.

use crate::domain::error::RsitraderError;
use crate::domain::series::InstrumentSeries;
use crate::ports::data_port::DataPort;
use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum UniverseMembership {
    Static(BTreeSet<String>),
    ByYear(BTreeMap<i32, BTreeSet<String>>),
}

impl UniverseMembership {
    /// Every supplied instrument is eligible on every date.
    pub fn all_of(series: &[InstrumentSeries]) -> Self {
        UniverseMembership::Static(series.iter().map(|s| s.code.clone()).collect())
    }

    pub fn by_year(table: BTreeMap<i32, BTreeSet<String>>) -> Result<Self, UniverseError> {
        if table.is_empty() {
            return Err(UniverseError::EmptyMembership);
        }
        Ok(UniverseMembership::ByYear(table))
    }

    /// Entry-eligible codes for `date`.
    ///
    /// A year missing from the table falls back to the nearest earlier year,
    /// or to the earliest year when nothing earlier exists.
    pub fn eligible(&self, date: NaiveDate) -> &BTreeSet<String> {
        match self {
            UniverseMembership::Static(codes) => codes,
            UniverseMembership::ByYear(table) => table
                .range(..=date.year())
                .next_back()
                .or_else(|| table.iter().next())
                .map(|(_, codes)| codes)
                .unwrap_or(&EMPTY),
        }
    }

    /// Every code that is a member in any year.
    pub fn all_codes(&self) -> BTreeSet<String> {
        match self {
            UniverseMembership::Static(codes) => codes.clone(),
            UniverseMembership::ByYear(table) => table.values().flatten().cloned().collect(),
        }
    }
}

static EMPTY: BTreeSet<String> = BTreeSet::new();

#[derive(Debug, Clone, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in code list")]
    EmptyToken,

    #[error("duplicate code: {0}")]
    DuplicateCode(String),

    #[error("universe membership table has no years")]
    EmptyMembership,
}

pub fn parse_codes(input: &str) -> Result<Vec<String>, UniverseError> {
    let mut codes = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(UniverseError::EmptyToken);
        }
        let code = trimmed.to_uppercase();
        if !seen.insert(code.clone()) {
            return Err(UniverseError::DuplicateCode(code));
        }
        codes.push(code);
    }

    Ok(codes)
}

pub struct UniverseValidationResult {
    pub series: Vec<InstrumentSeries>,
    pub skipped: Vec<SkippedCode>,
}

#[derive(Debug, Clone)]
pub struct SkippedCode {
    pub code: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NoData,
    InsufficientBars { bars: usize },
}

/// Fetches each code and keeps those with at least `min_bars` bars.
///
/// History before `start_date` is fetched too and counts toward
/// `min_bars`, since it warms up the indicators. A code with no bar inside
/// `[start_date, end_date]` is skipped as having no data.
pub fn validate_universe(
    data_port: &dyn DataPort,
    codes: Vec<String>,
    start_date: NaiveDate,
    end_date: NaiveDate,
    min_bars: usize,
) -> Result<UniverseValidationResult, RsitraderError> {
    let requested = codes.len();
    let mut series = Vec::new();
    let mut skipped = Vec::new();

    for code in codes {
        let ohlcv = match data_port.fetch_ohlcv(&code, NaiveDate::MIN, end_date) {
            Ok(data) => data,
            Err(e) => {
                warn!(%code, error = %e, "skipping code");
                skipped.push(SkippedCode {
                    code,
                    reason: SkipReason::NoData,
                });
                continue;
            }
        };

        if !ohlcv.iter().any(|bar| bar.date >= start_date) {
            warn!(%code, "skipping code: no data in range");
            skipped.push(SkippedCode {
                code,
                reason: SkipReason::NoData,
            });
            continue;
        }

        if ohlcv.len() < min_bars {
            warn!(
                %code,
                bars = ohlcv.len(),
                minimum = min_bars,
                "skipping code: insufficient history"
            );
            skipped.push(SkippedCode {
                code,
                reason: SkipReason::InsufficientBars { bars: ohlcv.len() },
            });
            continue;
        }

        info!(%code, bars = ohlcv.len(), "loaded");
        series.push(InstrumentSeries::new(code, ohlcv));
    }

    if series.is_empty() {
        return Err(RsitraderError::InsufficientData {
            code: "all".to_string(),
            bars: 0,
            minimum: min_bars,
        });
    }

    if !skipped.is_empty() {
        info!(
            kept = series.len(),
            requested, "universe reduced after validation"
        );
    }

    Ok(UniverseValidationResult { series, skipped })
}
