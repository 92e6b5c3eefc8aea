//! Exponential moving average trend filter.
//!
//! Seeded with the simple mean of the first n closes, then
//! EMA[i] = EMA[i-1] + k * (C[i] - EMA[i-1]) with k = 2/(n+1).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_ema(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Ema(period);
    if period == 0 || bars.len() < period {
        return IndicatorSeries {
            indicator_type,
            values: bars.iter().map(|b| IndicatorPoint::warmup(b.date)).collect(),
        };
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = bars[..period].iter().map(|b| b.close).sum::<f64>() / period as f64;

    let mut values: Vec<IndicatorPoint> = bars[..period - 1]
        .iter()
        .map(|b| IndicatorPoint::warmup(b.date))
        .collect();
    values.push(IndicatorPoint::ready(bars[period - 1].date, seed));

    let mut current = seed;
    for bar in &bars[period..] {
        current += k * (bar.close - current);
        values.push(IndicatorPoint::ready(bar.date, current));
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}
