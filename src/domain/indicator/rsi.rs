//! RSI (Relative Strength Index) oscillator.
//!
//! Each close-to-close change is split into a gain or a loss. The gain and
//! loss averages are smoothed with one of two conventions:
//! - `Wilder`: seed with the simple mean of the first n changes, then
//!   avg = (prev_avg * (n-1) + current) / n  (smoothing factor 1/n)
//! - `Cutler`: simple mean of the last n changes
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100 (saturates, including the flat case)
//!
//! Warmup: first n bars are invalid (need n price changes to compute the first average).

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::OhlcvBar;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RsiSmoothing {
    Wilder,
    Cutler,
}

impl fmt::Display for RsiSmoothing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RsiSmoothing::Wilder => write!(f, "wilder"),
            RsiSmoothing::Cutler => write!(f, "cutler"),
        }
    }
}

impl FromStr for RsiSmoothing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wilder" => Ok(RsiSmoothing::Wilder),
            "cutler" => Ok(RsiSmoothing::Cutler),
            other => Err(format!(
                "unknown oscillator smoothing '{}', expected wilder or cutler",
                other
            )),
        }
    }
}

pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

pub fn calculate_rsi(bars: &[OhlcvBar], period: usize, smoothing: RsiSmoothing) -> IndicatorSeries {
    let indicator_type = IndicatorType::Rsi { period, smoothing };

    if period == 0 || bars.len() <= period {
        return IndicatorSeries {
            indicator_type,
            values: bars.iter().map(|b| IndicatorPoint::warmup(b.date)).collect(),
        };
    }

    // gains[i] / losses[i] describe the move from bars[i] to bars[i + 1]
    let (gains, losses): (Vec<f64>, Vec<f64>) = bars
        .windows(2)
        .map(|w| {
            let change = w[1].change_from(w[0].close);
            (change.max(0.0), (-change).max(0.0))
        })
        .unzip();

    let mut values = Vec::with_capacity(bars.len());
    for bar in &bars[..period] {
        values.push(IndicatorPoint::warmup(bar.date));
    }

    match smoothing {
        RsiSmoothing::Wilder => {
            let n = period as f64;
            let mut avg_gain = gains[..period].iter().sum::<f64>() / n;
            let mut avg_loss = losses[..period].iter().sum::<f64>() / n;
            values.push(IndicatorPoint::ready(
                bars[period].date,
                rsi_from_averages(avg_gain, avg_loss),
            ));

            for (i, bar) in bars.iter().enumerate().skip(period + 1) {
                avg_gain = (avg_gain * (n - 1.0) + gains[i - 1]) / n;
                avg_loss = (avg_loss * (n - 1.0) + losses[i - 1]) / n;
                values.push(IndicatorPoint::ready(
                    bar.date,
                    rsi_from_averages(avg_gain, avg_loss),
                ));
            }
        }
        RsiSmoothing::Cutler => {
            let n = period as f64;
            for (i, bar) in bars.iter().enumerate().skip(period) {
                let window = i - period..i;
                let avg_gain = gains[window.clone()].iter().sum::<f64>() / n;
                let avg_loss = losses[window].iter().sum::<f64>() / n;
                values.push(IndicatorPoint::ready(
                    bar.date,
                    rsi_from_averages(avg_gain, avg_loss),
                ));
            }
        }
    }

    IndicatorSeries {
        indicator_type,
        values,
    }
}
