//! Live-tunable config overrides (SPEC_FULL.md §3, §9). Rows are `(key,
//! value, updater_id, updated_at)`; applying them onto the typed `Settings`
//! tree goes through `vestnik_common::types::apply_override`, which already
//! rejects unknown paths and malformed values.

use chrono::{DateTime, Utc};
use vestnik_common::error::{Result, VestnikError};
use vestnik_common::types::{apply_override, Settings};

use crate::pool::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConfigOverrideRow {
    pub key: String,
    pub value: String,
    pub updater_id: String,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    pub async fn set_override(&self, key: &str, value: &str, updater_id: &str, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO config_overrides (key, value, updater_id, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updater_id = excluded.updater_id, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(updater_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn list_overrides(&self) -> Result<Vec<ConfigOverrideRow>> {
        sqlx::query_as::<_, ConfigOverrideRow>("SELECT * FROM config_overrides")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))
    }

    /// Loads every stored override and applies it onto a fresh `Settings`
    /// default, in insertion order. An override whose path is no longer
    /// recognized is logged and skipped rather than failing the whole load.
    pub async fn load_settings(&self) -> Result<Settings> {
        let mut settings = Settings::default();
        for row in self.list_overrides().await? {
            if let Err(err) = apply_override(&mut settings, &row.key, &row.value) {
                tracing::warn!(key = %row.key, error = %err, "skipping unrecognized config override");
            }
        }
        Ok(settings)
    }
}
