//! Incident clustering (SPEC_FULL.md §4.12).
//!
//! The lookup-then-upsert here is called from inside the signal-creation
//! transaction (see `signals::try_create_if_under_limit`) so a concurrent
//! cycle can never observe a signal without its incident or vice versa.

use chrono::{DateTime, Duration, Utc};
use sqlx::{Sqlite, Transaction};
use vestnik_common::error::{Result, VestnikError};
use vestnik_common::types::{EventType, ObjectKind};

use crate::pool::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IncidentRow {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub title: String,
    pub region: Option<String>,
    pub object_kind: String,
    pub event_type: String,
    pub status: String,
    pub signal_count: i64,
}

const CLUSTER_WINDOW_HOURS: i64 = 24;

/// Finds an open incident matching region+event_type updated within the
/// last 24 hours and bumps its count, or creates a new one with count 1.
/// Returns the incident id either way.
pub(crate) async fn find_or_create_in_tx(
    tx: &mut Transaction<'_, Sqlite>,
    title: &str,
    region: Option<&str>,
    object_kind: ObjectKind,
    event_type: EventType,
    now: DateTime<Utc>,
) -> Result<i64> {
    let window_start = now - Duration::hours(CLUSTER_WINDOW_HOURS);

    let existing: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT id FROM incidents
        WHERE status = 'open'
          AND event_type = ?
          AND updated_at >= ?
          AND ((region IS NULL AND ? IS NULL) OR region = ?)
        ORDER BY updated_at DESC
        LIMIT 1
        "#,
    )
    .bind(event_type.as_str())
    .bind(window_start)
    .bind(region)
    .bind(region)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| VestnikError::Database(e.to_string()))?;

    if let Some(id) = existing {
        sqlx::query("UPDATE incidents SET signal_count = signal_count + 1, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&mut **tx)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;
        return Ok(id);
    }

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO incidents (created_at, updated_at, title, region, object_kind, event_type, status, signal_count)
        VALUES (?, ?, ?, ?, ?, ?, 'open', 1)
        RETURNING id
        "#,
    )
    .bind(now)
    .bind(now)
    .bind(title)
    .bind(region)
    .bind(object_kind.as_str())
    .bind(event_type.as_str())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| VestnikError::Database(e.to_string()))?;

    Ok(id)
}

impl Store {
    /// Used when a candidate is suppressed as a near-duplicate: the incident
    /// still records the observation (DESIGN.md open-question decision),
    /// even though no Signal row is created for it.
    pub async fn record_suppressed(
        &self,
        title: &str,
        region: Option<&str>,
        object_kind: ObjectKind,
        event_type: EventType,
        now: DateTime<Utc>,
    ) -> Result<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;
        let id = find_or_create_in_tx(&mut tx, title, region, object_kind, event_type, now).await?;
        tx.commit().await.map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(id)
    }

    pub async fn get_incident(&self, id: i64) -> Result<Option<IncidentRow>> {
        sqlx::query_as::<_, IncidentRow>("SELECT * FROM incidents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))
    }

    /// Retention: incidents older than 60 days are deleted outright — nothing
    /// transitions them to `closed` first in this version (DESIGN.md).
    pub async fn delete_stale_incidents(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM incidents WHERE updated_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
