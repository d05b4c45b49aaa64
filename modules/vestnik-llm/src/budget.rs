//! Daily spend ledger and budget guardrail (SPEC_FULL.md §4.9).

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use vestnik_common::time::day_bounds_utc;

use crate::types::UsageEntry;

#[derive(Debug, Default)]
pub struct UsageLedger {
    entries: Vec<UsageEntry>,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: UsageEntry) {
        self.entries.push(entry);
    }

    pub fn daily_spend(&self, now: DateTime<Utc>, zone: Tz) -> f64 {
        let (start, end) = day_bounds_utc(now, zone);
        self.entries
            .iter()
            .filter(|e| e.at >= start && e.at < end)
            .map(|e| e.cost)
            .sum()
    }

    pub fn entries(&self) -> &[UsageEntry] {
        &self.entries
    }
}

pub struct BudgetGuard {
    pub daily_limit: f64,
}

impl BudgetGuard {
    pub fn within_budget(&self, ledger: &UsageLedger, now: DateTime<Utc>, zone: Tz) -> bool {
        ledger.daily_spend(now, zone) <= self.daily_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry(cost: f64, at: DateTime<Utc>) -> UsageEntry {
        UsageEntry {
            at,
            model: "gpt-4o-mini".to_string(),
            prompt_tokens: 400,
            completion_tokens: 100,
            cost,
            latency_ms: 900,
            status: "ok",
            error_category: None,
        }
    }

    #[test]
    fn sums_only_todays_entries_in_configured_zone() {
        let mut ledger = UsageLedger::new();
        let zone = chrono_tz::Europe::Moscow;
        let today = Utc.with_ymd_and_hms(2026, 3, 15, 10, 0, 0).unwrap();
        let yesterday = Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap();
        ledger.record(entry(1.0, today));
        ledger.record(entry(2.0, yesterday));
        assert_eq!(ledger.daily_spend(today, zone), 1.0);
    }

    #[test]
    fn guard_passes_under_limit_and_blocks_over() {
        let mut ledger = UsageLedger::new();
        let now = Utc::now();
        ledger.record(entry(4.5, now));
        let guard = BudgetGuard { daily_limit: 5.0 };
        assert!(guard.within_budget(&ledger, now, chrono_tz::Europe::Moscow));

        ledger.record(entry(1.0, now));
        assert!(!guard.within_budget(&ledger, now, chrono_tz::Europe::Moscow));
    }
}
