//! Freshness gate (SPEC_FULL.md §4.2). Internal clock is naive UTC: any
//! timezone offset on `published_at` is normalized away before comparison.

use chrono::{DateTime, Utc};
use vestnik_common::types::DecisionCode;
use vestnik_common::FreshnessConfig;

#[derive(Debug, Clone, PartialEq)]
pub enum FreshnessVerdict {
    Pass { age_days: i64 },
    MissingPublishedAt,
    Stale { age_days: i64 },
}

impl FreshnessVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, FreshnessVerdict::Pass { .. })
    }

    pub fn decision_code(&self) -> Option<DecisionCode> {
        match self {
            FreshnessVerdict::Pass { .. } => None,
            FreshnessVerdict::MissingPublishedAt => Some(DecisionCode::MissingPublishedAt),
            FreshnessVerdict::Stale { .. } => Some(DecisionCode::StaleNews),
        }
    }
}

pub fn check_freshness(
    published_at: Option<DateTime<Utc>>,
    collected_at: DateTime<Utc>,
    now: DateTime<Utc>,
    config: &FreshnessConfig,
) -> FreshnessVerdict {
    let age_days = match published_at {
        Some(published) => (now - published).num_days(),
        None => {
            if config.allow_missing_published_at && config.fallback_to_collected_at {
                (now - collected_at).num_days().max(0)
            } else {
                return FreshnessVerdict::MissingPublishedAt;
            }
        }
    };

    if age_days > config.max_age_days {
        FreshnessVerdict::Stale { age_days }
    } else {
        FreshnessVerdict::Pass { age_days }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn config() -> FreshnessConfig {
        FreshnessConfig {
            max_age_days: 21,
            allow_missing_published_at: true,
            fallback_to_collected_at: true,
        }
    }

    #[test]
    fn passes_recent_item() {
        let now = Utc::now();
        let published = now - Duration::days(1);
        let verdict = check_freshness(Some(published), now, now, &config());
        assert!(verdict.passed());
    }

    #[test]
    fn rejects_stale_item_with_code() {
        let now = Utc::now();
        let published = now - Duration::days(30);
        let verdict = check_freshness(Some(published), now, now, &config());
        assert!(!verdict.passed());
        assert_eq!(verdict.decision_code(), Some(DecisionCode::StaleNews));
    }

    #[test]
    fn missing_published_at_falls_back_to_collected() {
        let now = Utc::now();
        let collected = now - Duration::hours(2);
        let verdict = check_freshness(None, collected, now, &config());
        assert!(verdict.passed());
    }

    #[test]
    fn missing_published_at_rejected_when_fallback_disabled() {
        let now = Utc::now();
        let mut cfg = config();
        cfg.fallback_to_collected_at = false;
        let verdict = check_freshness(None, now, now, &cfg);
        assert_eq!(verdict.decision_code(), Some(DecisionCode::MissingPublishedAt));
    }

    #[test]
    fn boundary_at_exactly_max_age_days_passes() {
        let now = Utc::now();
        let published = now - Duration::days(21);
        let verdict = check_freshness(Some(published), now, now, &config());
        assert!(verdict.passed());
    }
}
