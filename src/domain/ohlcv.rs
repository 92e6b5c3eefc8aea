//! Daily OHLCV bar representation.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub code: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    /// Both execution prices are finite and positive, and the range is not inverted.
    pub fn is_tradable(&self) -> bool {
        self.open.is_finite()
            && self.close.is_finite()
            && self.open > 0.0
            && self.close > 0.0
            && self.high >= self.low
    }

    /// Close-to-close change against the previous bar's close.
    pub fn change_from(&self, prev_close: f64) -> f64 {
        self.close - prev_close
    }
}
