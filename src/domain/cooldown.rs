//! Re-entry cooldowns after losing exits.

use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;

/// Codes barred from new entries, each until the date re-entry becomes legal.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CooldownLedger {
    until: BTreeMap<String, NaiveDate>,
}

impl CooldownLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bar `code` for `days` calendar days after `exit_date`.
    pub fn start(&mut self, code: &str, exit_date: NaiveDate, days: u32) {
        let until = exit_date + Duration::days(i64::from(days));
        self.until.insert(code.to_string(), until);
    }

    /// True while `date` is strictly before the release date.
    pub fn is_active(&self, code: &str, date: NaiveDate) -> bool {
        self.until.get(code).is_some_and(|&until| date < until)
    }

    /// Drop entries whose release date has been reached.
    pub fn purge_expired(&mut self, date: NaiveDate) {
        self.until.retain(|_, until| date < *until);
    }
}
