//! Daily retention job (SPEC_FULL.md §4.15). Each delete is its own
//! transaction-scoped statement; any storage-level space reclaim runs
//! afterward on a dedicated connection, never inside these deletes.

use chrono::{DateTime, Duration, Utc};
use tracing::info;
use vestnik_common::error::{Result, VestnikError};

use crate::pool::Store;

pub const NEWS_RETENTION_DAYS: i64 = 30;
pub const USAGE_RETENTION_DAYS: i64 = 30;
pub const LOCK_RETENTION_DAYS: i64 = 30;
pub const INCIDENT_RETENTION_DAYS: i64 = 60;

#[derive(Debug, Default)]
pub struct RetentionReport {
    pub news_deleted: u64,
    pub usage_deleted: u64,
    pub locks_deleted: u64,
    pub incidents_deleted: u64,
}

impl Store {
    pub async fn run_retention(&self, now: DateTime<Utc>) -> Result<RetentionReport> {
        let news_deleted = self
            .delete_stale_terminal(now - Duration::days(NEWS_RETENTION_DAYS))
            .await?;
        let usage_deleted = self
            .delete_stale_usage(now - Duration::days(USAGE_RETENTION_DAYS))
            .await?;
        let locks_deleted = self
            .delete_stale_locks(now - Duration::days(LOCK_RETENTION_DAYS))
            .await?;
        let incidents_deleted = self
            .delete_stale_incidents(now - Duration::days(INCIDENT_RETENTION_DAYS))
            .await?;

        let report = RetentionReport {
            news_deleted,
            usage_deleted,
            locks_deleted,
            incidents_deleted,
        };

        info!(
            news_deleted = report.news_deleted,
            usage_deleted = report.usage_deleted,
            locks_deleted = report.locks_deleted,
            incidents_deleted = report.incidents_deleted,
            "retention pass complete"
        );

        Ok(report)
    }

    /// Reclaims free pages on a dedicated connection, outside any
    /// transaction — `VACUUM` cannot run inside one in SQLite.
    pub async fn vacuum(&self, database_url: &str) -> Result<()> {
        use sqlx::Connection;
        let mut conn = sqlx::SqliteConnection::connect(database_url)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;
        sqlx::query("VACUUM")
            .execute(&mut conn)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(())
    }
}
