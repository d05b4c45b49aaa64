//! Subscriber persistence (SPEC_FULL.md §3). No personal identifiers are
//! stored here beyond the chat id — that is the privacy contract.

use chrono::{DateTime, Utc};
use vestnik_common::error::{Result, VestnikError};

use crate::pool::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriberRow {
    pub chat_id: i64,
    pub created_at: DateTime<Utc>,
    pub active: bool,
    pub last_seen_at: DateTime<Utc>,
}

impl Store {
    pub async fn upsert_subscriber(&self, chat_id: i64, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO subscribers (chat_id, created_at, active, last_seen_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(chat_id) DO UPDATE SET active = 1, last_seen_at = excluded.last_seen_at
            "#,
        )
        .bind(chat_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn active_subscribers(&self) -> Result<Vec<SubscriberRow>> {
        sqlx::query_as::<_, SubscriberRow>("SELECT * FROM subscribers WHERE active = 1")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))
    }

    pub async fn deactivate(&self, chat_id: i64) -> Result<()> {
        sqlx::query("UPDATE subscribers SET active = 0 WHERE chat_id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(())
    }
}
