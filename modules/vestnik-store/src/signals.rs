//! Signal persistence and atomic daily limiting (SPEC_FULL.md §4.11).

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use vestnik_common::error::{Result, VestnikError};
use vestnik_common::time::day_bounds_utc;
use vestnik_common::types::{EventType, ObjectKind};

use crate::incidents::find_or_create_in_tx;
use crate::pool::Store;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SignalRow {
    pub id: i64,
    pub news_item_id: i64,
    pub sent_at: DateTime<Utc>,
    pub event_type: String,
    pub urgency: i64,
    pub object_kind: String,
    pub sphere: String,
    pub region: Option<String>,
    pub why: String,
    pub message_body: String,
    pub recipient_count: i64,
}

pub struct NewSignal {
    pub news_item_id: i64,
    pub event_type: EventType,
    pub urgency: u8,
    pub object_kind: ObjectKind,
    pub region: Option<String>,
    pub why: String,
    pub message_body: String,
    pub incident_title: String,
}

impl Store {
    /// Opens a transaction, counts today's signals in `zone`, and — only if
    /// under `daily_max` — clusters the incident and inserts the signal, all
    /// in that one transaction. Returns `None` (no insert happened) if the
    /// cap was already reached.
    pub async fn try_create_if_under_limit(
        &self,
        signal: NewSignal,
        now: DateTime<Utc>,
        zone: Tz,
        daily_max: i64,
    ) -> Result<Option<i64>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;

        let (start, end) = day_bounds_utc(now, zone);
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM signals WHERE sent_at >= ? AND sent_at < ?")
            .bind(start)
            .bind(end)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;

        if count >= daily_max {
            tx.rollback().await.map_err(|e| VestnikError::Database(e.to_string()))?;
            return Ok(None);
        }

        find_or_create_in_tx(
            &mut tx,
            &signal.incident_title,
            signal.region.as_deref(),
            signal.object_kind,
            signal.event_type,
            now,
        )
        .await?;

        let sphere = signal.object_kind.sphere();

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO signals
                (news_item_id, sent_at, event_type, urgency, object_kind, sphere, region, why, message_body, recipient_count)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0)
            RETURNING id
            "#,
        )
        .bind(signal.news_item_id)
        .bind(now)
        .bind(signal.event_type.as_str())
        .bind(signal.urgency as i64)
        .bind(signal.object_kind.as_str())
        .bind(sphere.to_string())
        .bind(&signal.region)
        .bind(&signal.why)
        .bind(&signal.message_body)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| VestnikError::Database(e.to_string()))?;

        tx.commit().await.map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(Some(id))
    }

    /// Most recent matching signal within the trailing `hours`, used to
    /// suppress near-duplicate alerts with `suppressed_similar`.
    pub async fn find_similar_recent(
        &self,
        event_type: EventType,
        region: Option<&str>,
        object_kind: ObjectKind,
        now: DateTime<Utc>,
        hours: i64,
    ) -> Result<Option<SignalRow>> {
        let window_start = now - Duration::hours(hours);
        sqlx::query_as::<_, SignalRow>(
            r#"
            SELECT * FROM signals
            WHERE event_type = ?
              AND object_kind = ?
              AND sent_at >= ?
              AND ((region IS NULL AND ? IS NULL) OR region = ?)
            ORDER BY sent_at DESC
            LIMIT 1
            "#,
        )
        .bind(event_type.as_str())
        .bind(object_kind.as_str())
        .bind(window_start)
        .bind(region)
        .bind(region)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| VestnikError::Database(e.to_string()))
    }

    pub async fn increment_recipient_count(&self, signal_id: i64, delta: i64) -> Result<()> {
        sqlx::query("UPDATE signals SET recipient_count = recipient_count + ? WHERE id = ?")
            .bind(delta)
            .bind(signal_id)
            .execute(&self.pool)
            .await
            .map_err(|e| VestnikError::Database(e.to_string()))?;
        Ok(())
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

    fn signal(news_item_id: i64, title: &str) -> NewSignal {
        NewSignal {
            news_item_id,
            event_type: EventType::Accident,
            urgency: 4,
            object_kind: ObjectKind::Heat,
            region: Some("Свердловская область".to_string()),
            why: "burst main".to_string(),
            message_body: "body".to_string(),
            incident_title: title.to_string(),
        }
    }

    #[tokio::test]
    async fn sixth_signal_is_suppressed_once_the_daily_cap_is_reached() {
        let store = test_store().await;
        let now = Utc::now();
        let zone = chrono_tz::Europe::Moscow;

        for i in 0..5 {
            let id = store.try_create_if_under_limit(signal(i, "incident a"), now, zone, 5).await.unwrap();
            assert!(id.is_some());
        }

        let sixth = store.try_create_if_under_limit(signal(99, "incident b"), now, zone, 5).await.unwrap();
        assert!(sixth.is_none());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM signals").fetch_one(&store.pool).await.unwrap();
        assert_eq!(count, 5);
    }

    /// `try_create_if_under_limit` re-checks the count inside the same
    /// transaction that performs the insert, so the boundary transition from
    /// "one slot left" to "at cap" is exact regardless of call ordering:
    /// the attempt that lands on the last slot succeeds, every attempt after
    /// it returns `None` without an insert.
    #[tokio::test]
    async fn the_attempt_that_fills_the_last_slot_succeeds_and_the_next_does_not() {
        let store = test_store().await;
        let now = Utc::now();
        let zone = chrono_tz::Europe::Moscow;

        assert!(store.try_create_if_under_limit(signal(1, "incident a"), now, zone, 2).await.unwrap().is_some());
        assert!(store.try_create_if_under_limit(signal(2, "incident b"), now, zone, 2).await.unwrap().is_some());
        assert!(store.try_create_if_under_limit(signal(3, "incident c"), now, zone, 2).await.unwrap().is_none());

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM signals").fetch_one(&store.pool).await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn find_similar_recent_matches_on_event_type_object_and_region() {
        let store = test_store().await;
        let now = Utc::now();
        let zone = chrono_tz::Europe::Moscow;
        store.try_create_if_under_limit(signal(1, "incident a"), now, zone, 5).await.unwrap();

        let hit = store
            .find_similar_recent(EventType::Accident, Some("Свердловская область"), ObjectKind::Heat, now, 24)
            .await
            .unwrap();
        assert!(hit.is_some());

        let miss = store
            .find_similar_recent(EventType::Accident, Some("Москва"), ObjectKind::Heat, now, 24)
            .await
            .unwrap();
        assert!(miss.is_none());
    }
}
