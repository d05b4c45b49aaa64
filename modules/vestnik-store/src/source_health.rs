//! Per-source health accounting persistence (SPEC_FULL.md §3, §4.8, §4.15
//! auto-heal). Kept decoupled from `vestnik-ingest`'s in-memory
//! `SourceHealth` type — the orchestrator is what translates between the
//! two, so this crate doesn't need a dependency on the fetcher crate.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use vestnik_common::error::{Result, VestnikError};

use crate::pool::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SourceHealthRow {
    pub source_id: String,
    pub consecutive_failures: i64,
    pub total_fetches: i64,
    pub last_ok_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_status_code: Option<i64>,
    pub last_error_message: Option<String>,
    pub is_disabled: bool,
    pub disabled_at: Option<DateTime<Utc>>,
    pub disabled_reason: Option<String>,
}

pub struct HealthUpdate {
    pub source_id: Uuid,
    pub consecutive_failures: i64,
    pub total_fetches: i64,
    pub last_ok_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub last_status_code: Option<i64>,
    pub last_error_message: Option<String>,
    pub is_disabled: bool,
    pub disabled_at: Option<DateTime<Utc>>,
    pub disabled_reason: Option<String>,
}

impl Store {
    pub async fn upsert_health(&self, update: HealthUpdate) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO source_health
                (source_id, consecutive_failures, total_fetches, last_ok_at, last_error_at,
                 last_status_code, last_error_message, is_disabled, disabled_at, disabled_reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source_id) DO UPDATE SET
                consecutive_failures = excluded.consecutive_failures,
                total_fetches = excluded.total_fetches,
                last_ok_at = excluded.last_ok_at,
                last_error_at = excluded.last_error_at,
                last_status_code = excluded.last_status_code,
                last_error_message = excluded.last_error_message,
                is_disabled = excluded.is_disabled,
                disabled_at = excluded.disabled_at,
                disabled_reason = excluded.disabled_reason
            "#,
        )
        .bind(update.source_id.to_string())
        .bind(update.consecutive_failures)
        .bind(update.total_fetches)
        .bind(update.last_ok_at)
        .bind(update.last_error_at)
        .bind(update.last_status_code)
        .bind(update.last_error_message)
        .bind(update.is_disabled)
        .bind(update.disabled_at)
        .bind(update.disabled_reason)
        .execute(&self.pool)
        .await
        .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn get_health(&self, source_id: Uuid) -> Result<Option<SourceHealthRow>> {
        sqlx::query_as::<_, SourceHealthRow>("SELECT * FROM source_health WHERE source_id = ?")
            .bind(source_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))
    }

    /// Disabled sources whose `disabled_at` is past the auto-heal cooldown.
    pub async fn disabled_past_cooldown(&self, cooldown_cutoff: DateTime<Utc>) -> Result<Vec<SourceHealthRow>> {
        sqlx::query_as::<_, SourceHealthRow>(
            "SELECT * FROM source_health WHERE is_disabled = 1 AND disabled_at < ?",
        )
        .bind(cooldown_cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| VestnikError::Database(e.to_string()))
    }

    pub async fn reenable_source(&self, source_id: &str) -> Result<()> {
        sqlx::query(
            "UPDATE source_health SET is_disabled = 0, disabled_at = NULL, disabled_reason = NULL, consecutive_failures = 0 WHERE source_id = ?",
        )
        .bind(source_id)
        .execute(&self.pool)
        .await
        .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(())
    }
}
