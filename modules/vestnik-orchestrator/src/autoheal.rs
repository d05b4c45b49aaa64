//! Auto-heal job (SPEC_FULL.md §4.8, §4.15): periodically re-enables a
//! disabled source once its cooldown has elapsed. Runs against durable
//! health rows (`disabled_at`-based), not the in-memory per-cycle
//! `SourceHealth::maybe_reheal`, which tracks `last_ok_at` and only makes
//! sense within a single fetch fan-out — this job spans cycles.

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use vestnik_store::Store;

const COOLDOWN_MINUTES: i64 = 60;

/// Re-enables at most one source per run, the most conservative choice
/// available: if several sources are past cooldown, only the first (oldest
/// `disabled_at`) comes back this run, and the rest wait for the next one.
pub async fn run(store: &Store, now: DateTime<Utc>) -> vestnik_common::error::Result<()> {
    let cutoff = now - Duration::minutes(COOLDOWN_MINUTES);
    let mut candidates = store.disabled_past_cooldown(cutoff).await?;
    candidates.sort_by_key(|row| row.disabled_at);

    if let Some(row) = candidates.into_iter().next() {
        store.reenable_source(&row.source_id).await?;
        info!(source_id = %row.source_id, "auto-healed source past cooldown");
    }

    Ok(())
}
