//! Per-cycle outcome tallying, logged at the end of every news cycle.

use std::collections::HashMap;
use std::fmt;

use vestnik_common::types::DecisionCode;

/// Counts of what happened to each item touched in a cycle. Fixed fields for
/// the stages every run exercises; the `decisions` map catches everything
/// tagged with a [`DecisionCode`] without needing a field per code.
#[derive(Debug, Default)]
pub struct CycleStats {
    pub fetched: u32,
    pub dropped_backpressure: u32,
    pub url_duplicate: u32,
    pub persisted: u32,
    pub simhash_duplicate: u32,
    pub sent: u32,
    pub suppressed_limit: u32,
    pub suppressed_similar: u32,
    pub decisions: HashMap<&'static str, u32>,
}

impl CycleStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_decision(&mut self, code: DecisionCode) {
        *self.decisions.entry(code.as_str()).or_insert(0) += 1;
    }
}

impl fmt::Display for CycleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched={} dropped_backpressure={} url_duplicate={} persisted={} \
             simhash_duplicate={} sent={} suppressed_limit={} suppressed_similar={}",
            self.fetched,
            self.dropped_backpressure,
            self.url_duplicate,
            self.persisted,
            self.simhash_duplicate,
            self.sent,
            self.suppressed_limit,
            self.suppressed_similar,
        )?;
        let mut codes: Vec<_> = self.decisions.iter().collect();
        codes.sort_by_key(|(code, _)| **code);
        for (code, count) in codes {
            write!(f, " {code}={count}")?;
        }
        Ok(())
    }
}
