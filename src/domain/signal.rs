//! Entry and exit rules for one simulated date.
//!
//! Exits: oscillator at or above the sell threshold, or the position has
//! been held for the maximum number of trading days. Entries: eligible,
//! flat, not cooling down, close above the trend filter and oscillator at or
//! below the buy threshold. Candidates are ranked most oversold first.

use crate::domain::config::SimulationConfig;
use crate::domain::portfolio::Portfolio;
use crate::domain::position::{ExitReason, Position};
use crate::domain::series::{FrameSet, SignalPoint};
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq)]
pub struct ExitSignal {
    pub code: String,
    pub reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryCandidate {
    pub code: String,
    pub oscillator: f64,
}

/// Exit reason for `position` given today's point, if any.
///
/// The signal leg wins when both legs hold. A missing oscillator disables
/// only the signal leg.
pub fn exit_reason(
    position: &Position,
    point: &SignalPoint<'_>,
    config: &SimulationConfig,
) -> Option<ExitReason> {
    let signal = point
        .oscillator
        .is_some_and(|osc| osc >= config.sell_threshold);
    if signal {
        return Some(ExitReason::Signal);
    }
    if position.days_held >= config.max_holding_days {
        return Some(ExitReason::MaxHoldingPeriod);
    }
    None
}

/// Exit signals for every open position that traded on `date`, in code order.
///
/// Codes in `skip` (exits already queued) are not re-evaluated.
pub fn evaluate_exits(
    portfolio: &Portfolio,
    frames: &FrameSet<'_>,
    date: NaiveDate,
    config: &SimulationConfig,
    skip: &BTreeSet<String>,
) -> Vec<ExitSignal> {
    portfolio
        .positions
        .values()
        .filter(|position| !skip.contains(&position.code))
        .filter_map(|position| {
            let point = frames.point(&position.code, date)?;
            if !point.bar.is_tradable() {
                return None;
            }
            exit_reason(position, &point, config).map(|reason| ExitSignal {
                code: position.code.clone(),
                reason,
            })
        })
        .collect()
}

/// True when the point passes the oversold-in-uptrend rule.
pub fn is_entry_signal(point: &SignalPoint<'_>, config: &SimulationConfig) -> bool {
    if !point.is_actionable() {
        return false;
    }
    match (point.oscillator, point.trend) {
        (Some(osc), Some(trend)) => point.bar.close > trend && osc <= config.buy_threshold,
        _ => false,
    }
}

/// Ranked entry candidates for `date`, at most `slots` of them.
///
/// `eligible` is the universe for the date; `pending` holds codes with an
/// entry already queued.
pub fn evaluate_entries(
    portfolio: &Portfolio,
    frames: &FrameSet<'_>,
    eligible: &BTreeSet<String>,
    date: NaiveDate,
    config: &SimulationConfig,
    pending: &BTreeSet<String>,
    slots: usize,
) -> Vec<EntryCandidate> {
    if slots == 0 {
        return Vec::new();
    }

    let candidates = eligible
        .iter()
        .filter(|code| !portfolio.has_position(code))
        .filter(|code| !pending.contains(*code))
        .filter(|code| !portfolio.cooldowns.is_active(code, date))
        .filter_map(|code| {
            let point = frames.point(code, date)?;
            if !is_entry_signal(&point, config) {
                return None;
            }
            Some(EntryCandidate {
                code: code.clone(),
                oscillator: point.oscillator?,
            })
        })
        .collect();

    let mut ranked = rank_candidates(candidates);
    ranked.truncate(slots);
    ranked
}

/// Ascending oscillator, ties by code ascending.
pub fn rank_candidates(mut candidates: Vec<EntryCandidate>) -> Vec<EntryCandidate> {
    candidates.sort_by(|a, b| match a.oscillator.total_cmp(&b.oscillator) {
        Ordering::Equal => a.code.cmp(&b.code),
        other => other,
    });
    candidates
}
