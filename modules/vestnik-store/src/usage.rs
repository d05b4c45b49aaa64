//! Append-only LLM usage ledger persistence (SPEC_FULL.md §3, §4.9).
//!
//! `vestnik-llm`'s in-process `UsageLedger` drives the same-cycle budget
//! check; this table is the durable record the budget check is rebuilt from
//! across orchestrator restarts, and what the 30-day retention job prunes.

use chrono::{DateTime, Utc};
use vestnik_common::error::{Result, VestnikError};

use crate::pool::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UsageEntryRow {
    pub id: i64,
    pub at: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub cost: f64,
    pub latency_ms: i64,
    pub status: String,
    pub error_category: Option<String>,
    pub context_tag: Option<String>,
}

pub struct NewUsageEntry {
    pub at: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub cost: f64,
    pub latency_ms: i64,
    pub status: String,
    pub error_category: Option<String>,
    pub context_tag: Option<String>,
}

impl Store {
    pub async fn record_usage(&self, entry: NewUsageEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO llm_usage_entries
                (at, provider, model, prompt_tokens, completion_tokens, cost, latency_ms, status, error_category, context_tag)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.at)
        .bind(&entry.provider)
        .bind(&entry.model)
        .bind(entry.prompt_tokens)
        .bind(entry.completion_tokens)
        .bind(entry.cost)
        .bind(entry.latency_ms)
        .bind(&entry.status)
        .bind(&entry.error_category)
        .bind(&entry.context_tag)
        .execute(&self.pool)
        .await
        .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn daily_cost(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<f64> {
        let cost: Option<f64> =
            sqlx::query_scalar("SELECT SUM(cost) FROM llm_usage_entries WHERE at >= ? AND at < ?")
                .bind(start)
                .bind(end)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(cost.unwrap_or(0.0))
    }

    /// Count of non-`ok` usage entries since `since`, used by the health
    /// endpoint's circuit-breaker approximation when read from a process that
    /// does not share the orchestrator's in-memory `CircuitBreaker`.
    pub async fn recent_error_count(&self, since: DateTime<Utc>) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM llm_usage_entries WHERE at >= ? AND status != 'ok'")
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))
    }

    pub async fn delete_stale_usage(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM llm_usage_entries WHERE at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(result.rows_affected())
    }
}
