//! Simple Moving Average trend filter.
//!
//! SMA[i] = mean(C[i-n+1..=i]). Each window is summed directly so the value
//! does not depend on how many bars came before it.
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if period == 0 || i + 1 < period {
                IndicatorPoint::warmup(bar.date)
            } else {
                let sum: f64 = bars[i + 1 - period..=i].iter().map(|b| b.close).sum();
                IndicatorPoint::ready(bar.date, sum / period as f64)
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}
