//! Source configuration and the raw item shape every fetcher produces.

use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Rss,
    SearchFeed,
    Web,
}

/// A configured content origin. `query_template` is only meaningful for
/// `SearchFeed` (a feed URL with `{query}`/`{lang}`/`{country}` placeholders);
/// `link_path_substrings` is only meaningful for `Web` (anchor hrefs must
/// contain one of these substrings, e.g. `/news/`, to be treated as articles).
#[derive(Debug, Clone)]
pub struct Source {
    pub id: Uuid,
    pub name: String,
    pub kind: SourceKind,
    pub url: String,
    pub query_template: Option<String>,
    pub link_path_substrings: Vec<String>,
    pub region_hint: Option<String>,
}

/// One fetched candidate, prior to any filter-funnel processing.
#[derive(Debug, Clone)]
pub struct RawItem {
    pub source_id: Uuid,
    pub source_name: String,
    pub url: String,
    pub title: String,
    pub raw_html: String,
    pub published_at: Option<DateTime<Utc>>,
    pub region_hint: Option<String>,
}

/// Per-source fetch health, mutated by the orchestrator after every cycle
/// (SPEC_FULL.md §4.8).
#[derive(Debug, Clone)]
pub struct SourceHealth {
    pub source_id: Uuid,
    pub consecutive_failures: u32,
    pub total_fetches: u64,
    pub last_ok_at: Option<DateTime<Utc>>,
    pub is_disabled: bool,
    pub disabled_reason: Option<String>,
    pub last_error: Option<String>,
}

impl SourceHealth {
    pub fn new(source_id: Uuid) -> Self {
        Self {
            source_id,
            consecutive_failures: 0,
            total_fetches: 0,
            last_ok_at: None,
            is_disabled: false,
            disabled_reason: None,
            last_error: None,
        }
    }

    const DISABLE_AFTER_CONSECUTIVE_FAILURES: u32 = 10;

    pub fn record_success(&mut self, now: DateTime<Utc>) {
        self.consecutive_failures = 0;
        self.total_fetches += 1;
        self.last_ok_at = Some(now);
        self.last_error = None;
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.consecutive_failures += 1;
        self.total_fetches += 1;
        self.last_error = Some(error.into());
        if self.consecutive_failures >= Self::DISABLE_AFTER_CONSECUTIVE_FAILURES {
            self.is_disabled = true;
            self.disabled_reason = Some(format!(
                "{} consecutive failures",
                self.consecutive_failures
            ));
        }
    }

    /// Auto-heal job re-enables a disabled source after a cooldown measured
    /// from its last successful fetch... but a source that's never succeeded
    /// has no `last_ok_at`; such sources stay disabled until manually reset.
    pub fn maybe_reheal(&mut self, now: DateTime<Utc>, cooldown_minutes: i64) {
        if !self.is_disabled {
            return;
        }
        if let Some(last_ok) = self.last_ok_at {
            if (now - last_ok).num_minutes() >= cooldown_minutes {
                self.is_disabled = false;
                self.disabled_reason = None;
                self.consecutive_failures = 0;
            }
        }
    }
}
