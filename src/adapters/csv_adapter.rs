//! CSV file data adapter.
//!
//! Bars live in `<base_path>/<CODE>.csv` with the header
//! `date,open,high,low,close,volume`. A universe membership table is a CSV
//! with the header `year,code`, one row per member.

use crate::domain::error::RsitraderError;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::universe::UniverseMembership;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }
}

fn field<T>(record: &csv::StringRecord, index: usize, name: &str) -> Result<T, RsitraderError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = record.get(index).ok_or_else(|| RsitraderError::Data {
        reason: format!("missing {} column", name),
    })?;
    raw.trim().parse().map_err(|e| RsitraderError::Data {
        reason: format!("invalid {} value '{}': {}", name, raw, e),
    })
}

fn date_field(record: &csv::StringRecord, index: usize) -> Result<NaiveDate, RsitraderError> {
    let raw = record.get(index).ok_or_else(|| RsitraderError::Data {
        reason: "missing date column".into(),
    })?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| RsitraderError::Data {
        reason: format!("invalid date '{}': {}", raw, e),
    })
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, RsitraderError> {
        let path = self.csv_path(code);
        if !path.exists() {
            return Err(RsitraderError::NoData {
                code: code.to_string(),
            });
        }
        let content = fs::read_to_string(&path)?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| RsitraderError::Data {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;

            let date = date_field(&record, 0)?;
            if date < start_date || date > end_date {
                continue;
            }

            bars.push(OhlcvBar {
                code: code.to_string(),
                date,
                open: field(&record, 1, "open")?,
                high: field(&record, 2, "high")?,
                low: field(&record, 3, "low")?,
                close: field(&record, 4, "close")?,
                volume: field(&record, 5, "volume")?,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, RsitraderError> {
        let entries = fs::read_dir(&self.base_path)?;
        let mut symbols = Vec::new();

        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().to_string());
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

/// Load a `year,code` membership table.
pub fn read_membership(path: &Path) -> Result<UniverseMembership, RsitraderError> {
    let content = fs::read_to_string(path)?;
    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut table: BTreeMap<i32, BTreeSet<String>> = BTreeMap::new();

    for result in rdr.records() {
        let record = result.map_err(|e| RsitraderError::Data {
            reason: format!("{}: CSV parse error: {}", path.display(), e),
        })?;
        let year: i32 = field(&record, 0, "year")?;
        let code: String = field(&record, 1, "code")?;
        if code.is_empty() {
            return Err(RsitraderError::Data {
                reason: format!("{}: empty code for year {}", path.display(), year),
            });
        }
        table.entry(year).or_default().insert(code.to_uppercase());
    }

    Ok(UniverseMembership::by_year(table)?)
}
