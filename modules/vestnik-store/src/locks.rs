//! Single-transaction processing lock (SPEC_FULL.md §4.14).

use chrono::{DateTime, Duration, Utc};
use vestnik_common::error::{Result, VestnikError};

use crate::pool::Store;

impl Store {
    /// `true` if the lock was acquired (no row, or the existing row's
    /// `expires_at` is already past). A crashed holder's lock therefore
    /// self-heals once its expiry passes, with no separate cleanup step.
    pub async fn acquire_lock(
        &self,
        name: &str,
        duration: Duration,
        holder_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;

        let expires_at: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT expires_at FROM processing_locks WHERE name = ?")
                .bind(name)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| VestnikError::Database(e.to_string()))?;

        let held = expires_at.is_some_and(|expires_at| expires_at > now);
        if held {
            tx.rollback().await.map_err(|e| VestnikError::Database(e.to_string()))?;
            return Ok(false);
        }

        let new_expiry = now + duration;
        sqlx::query(
            r#"
            INSERT INTO processing_locks (name, acquired_at, expires_at, holder_id)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET acquired_at = excluded.acquired_at, expires_at = excluded.expires_at, holder_id = excluded.holder_id
            "#,
        )
        .bind(name)
        .bind(now)
        .bind(new_expiry)
        .bind(holder_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| VestnikError::Database(e.to_string()))?;

        tx.commit().await.map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(true)
    }

    pub async fn release_lock(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM processing_locks WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(())
    }

    /// Retention: stale lock rows older than 30 days (a lock that was never
    /// released and long past its expiry).
    pub async fn delete_stale_locks(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM processing_locks WHERE expires_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> Store {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn second_acquire_fails_while_first_holds() {
        let store = test_store().await;
        let now = Utc::now();
        assert!(store.acquire_lock("processing", Duration::minutes(10), "a", now).await.unwrap());
        assert!(!store.acquire_lock("processing", Duration::minutes(10), "b", now).await.unwrap());
    }

    #[tokio::test]
    async fn acquire_succeeds_after_expiry() {
        let store = test_store().await;
        let now = Utc::now();
        assert!(store.acquire_lock("processing", Duration::minutes(10), "a", now).await.unwrap());
        let later = now + Duration::minutes(11);
        assert!(store.acquire_lock("processing", Duration::minutes(10), "b", later).await.unwrap());
    }

    #[tokio::test]
    async fn release_frees_the_lock_immediately() {
        let store = test_store().await;
        let now = Utc::now();
        assert!(store.acquire_lock("processing", Duration::minutes(10), "a", now).await.unwrap());
        store.release_lock("processing").await.unwrap();
        assert!(store.acquire_lock("processing", Duration::minutes(10), "b", now).await.unwrap());
    }
}
