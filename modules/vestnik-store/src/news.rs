//! NewsItem persistence (SPEC_FULL.md §3, §4.15 cycle stages).

use chrono::{DateTime, Utc};
use std::str::FromStr;
use vestnik_common::error::{Result, VestnikError};
use vestnik_common::types::NewsStatus;

use crate::pool::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NewsItemRow {
    pub id: i64,
    pub title: String,
    pub text: String,
    pub source_id: String,
    pub source_name: String,
    pub raw_url: String,
    pub normalized_url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
    pub region: Option<String>,
    pub filter1_score: i64,
    pub simhash: String,
    pub canonical_reference: Option<i64>,
    pub status: String,
    pub llm_classification: Option<String>,
    pub llm_raw_response: Option<String>,
}

impl NewsItemRow {
    pub fn news_status(&self) -> Result<NewsStatus> {
        NewsStatus::from_str(&self.status).map_err(|e| VestnikError::Database(e.to_string()))
    }
}

pub struct NewNewsItem {
    pub title: String,
    pub text: String,
    pub source_id: String,
    pub source_name: String,
    pub raw_url: String,
    pub normalized_url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub collected_at: DateTime<Utc>,
    pub region: Option<String>,
    pub filter1_score: i64,
    pub simhash: String,
}

impl Store {
    pub async fn find_by_normalized_url(&self, normalized_url: &str) -> Result<Option<NewsItemRow>> {
        sqlx::query_as::<_, NewsItemRow>("SELECT * FROM news_items WHERE normalized_url = ?")
            .bind(normalized_url)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))
    }

    /// Inserts a fresh item with status `raw`. The caller is expected to
    /// have already checked `find_by_normalized_url` for URL-level dedup —
    /// the `UNIQUE` constraint is a backstop, surfaced as `Database`.
    pub async fn insert_raw(&self, item: NewNewsItem) -> Result<i64> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO news_items
                (title, text, source_id, source_name, raw_url, normalized_url,
                 published_at, collected_at, region, filter1_score, simhash, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'raw')
            RETURNING id
            "#,
        )
        .bind(&item.title)
        .bind(&item.text)
        .bind(&item.source_id)
        .bind(&item.source_name)
        .bind(&item.raw_url)
        .bind(&item.normalized_url)
        .bind(item.published_at)
        .bind(item.collected_at)
        .bind(&item.region)
        .bind(item.filter1_score)
        .bind(&item.simhash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| VestnikError::Database(e.to_string()))?;

        Ok(id)
    }

    /// Marks a duplicate: status `duplicate`, pointing at its canonical item.
    pub async fn mark_duplicate(&self, id: i64, canonical_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE news_items SET status = 'duplicate', canonical_reference = ? WHERE id = ?",
        )
        .bind(canonical_id)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn update_status(&self, id: i64, status: NewsStatus) -> Result<()> {
        sqlx::query("UPDATE news_items SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn set_llm_result(
        &self,
        id: i64,
        classification_json: Option<&str>,
        raw_response: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE news_items SET llm_classification = ?, llm_raw_response = ? WHERE id = ?")
            .bind(classification_json)
            .bind(raw_response)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(())
    }

    /// Loads the simhash cache for the current cycle: `(id, simhash)` pairs
    /// for items collected since `since`, used by the orchestrator's
    /// per-cycle near-duplicate lookup instead of scanning the whole table.
    pub async fn recent_simhashes(&self, since: DateTime<Utc>) -> Result<Vec<(i64, String)>> {
        let rows: Vec<(i64, String)> =
            sqlx::query_as("SELECT id, simhash FROM news_items WHERE collected_at >= ?")
                .bind(since)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(rows)
    }

    pub async fn get(&self, id: i64) -> Result<Option<NewsItemRow>> {
        sqlx::query_as::<_, NewsItemRow>("SELECT * FROM news_items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))
    }

    /// Retention: delete non-signal terminal items collected before `cutoff`.
    /// `sent` is excluded — a sent item's row is the one a Signal references.
    pub async fn delete_stale_terminal(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM news_items
            WHERE collected_at < ?
              AND status != 'raw'
              AND status != 'sent'
            "#,
        )
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

    fn item(normalized_url: &str, simhash: &str) -> NewNewsItem {
        NewNewsItem {
            title: "title".to_string(),
            text: "text".to_string(),
            source_id: "src".to_string(),
            source_name: "Source".to_string(),
            raw_url: normalized_url.to_string(),
            normalized_url: normalized_url.to_string(),
            published_at: Some(Utc::now()),
            collected_at: Utc::now(),
            region: None,
            filter1_score: 5,
            simhash: simhash.to_string(),
        }
    }

    #[tokio::test]
    async fn insert_raw_defaults_to_raw_status() {
        let store = test_store().await;
        let id = store.insert_raw(item("https://example.com/a", "0000000000000001")).await.unwrap();
        let row = store.get(id).await.unwrap().unwrap();
        assert_eq!(row.news_status().unwrap(), NewsStatus::Raw);
        assert!(row.canonical_reference.is_none());
    }

    /// The `normalized_url` unique constraint is the backstop for exclusivity:
    /// a second insert under the same normalized URL must fail at the store
    /// layer even if a caller skips the `find_by_normalized_url` pre-check.
    #[tokio::test]
    async fn duplicate_normalized_url_is_rejected_by_the_unique_constraint() {
        let store = test_store().await;
        store.insert_raw(item("https://example.com/b", "0000000000000001")).await.unwrap();
        let second = store.insert_raw(item("https://example.com/b", "0000000000000002")).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn mark_duplicate_sets_canonical_reference() {
        let store = test_store().await;
        let canonical = store.insert_raw(item("https://example.com/c", "0000000000000001")).await.unwrap();
        let dup = store.insert_raw(item("https://example.com/d", "0000000000000002")).await.unwrap();

        store.mark_duplicate(dup, canonical).await.unwrap();

        let row = store.get(dup).await.unwrap().unwrap();
        assert_eq!(row.news_status().unwrap(), NewsStatus::Duplicate);
        assert_eq!(row.canonical_reference, Some(canonical));
    }

    #[tokio::test]
    async fn find_by_normalized_url_only_matches_the_normalized_form() {
        let store = test_store().await;
        store.insert_raw(item("https://example.com/e", "0000000000000001")).await.unwrap();
        assert!(store.find_by_normalized_url("https://example.com/e").await.unwrap().is_some());
        assert!(store.find_by_normalized_url("https://example.com/e?utm_source=x").await.unwrap().is_none());
    }
}
