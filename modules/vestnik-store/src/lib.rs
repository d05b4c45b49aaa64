pub mod config_overrides;
pub mod incidents;
pub mod locks;
pub mod news;
pub mod pool;
pub mod retention;
pub mod signals;
pub mod source_health;
pub mod subscribers;
pub mod usage;

pub use incidents::IncidentRow;
pub use news::{NewNewsItem, NewsItemRow};
pub use pool::Store;
pub use retention::RetentionReport;
pub use signals::{NewSignal, SignalRow};
pub use source_health::{HealthUpdate, SourceHealthRow};
pub use subscribers::SubscriberRow;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use vestnik_common::types::{EventType, ObjectKind};

    async fn test_store() -> Store {
        let store = Store::connect("sqlite::memory:").await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    fn sample_signal(news_item_id: i64) -> NewSignal {
        NewSignal {
            news_item_id,
            event_type: EventType::Accident,
            urgency: 4,
            object_kind: ObjectKind::Water,
            region: Some("Тульская область".to_string()),
            why: "burst main reported".to_string(),
            message_body: "formatted message".to_string(),
            incident_title: "water main break".to_string(),
        }
    }

    async fn insert_news_item(store: &Store, url: &str) -> i64 {
        store
            .insert_raw(NewNewsItem {
                title: "t".to_string(),
                text: "b".to_string(),
                source_id: "11111111-1111-1111-1111-111111111111".to_string(),
                source_name: "source".to_string(),
                raw_url: url.to_string(),
                normalized_url: url.to_string(),
                published_at: None,
                collected_at: Utc::now(),
                region: None,
                filter1_score: 5,
                simhash: "abc123".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn url_dedup_lookup_finds_existing_item() {
        let store = test_store().await;
        insert_news_item(&store, "https://example.com/a").await;
        let found = store.find_by_normalized_url("https://example.com/a").await.unwrap();
        assert!(found.is_some());
        assert!(store.find_by_normalized_url("https://example.com/b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_marking_points_at_canonical_and_keeps_status_pinned() {
        let store = test_store().await;
        let canonical = insert_news_item(&store, "https://example.com/a").await;
        let duplicate = insert_news_item(&store, "https://example.com/a?utm_source=x").await;

        store.mark_duplicate(duplicate, canonical).await.unwrap();

        let row = store.get(duplicate).await.unwrap().unwrap();
        assert_eq!(row.status, "duplicate");
        assert_eq!(row.canonical_reference, Some(canonical));
    }

    #[tokio::test]
    async fn signal_creation_clusters_into_a_new_incident() {
        let store = test_store().await;
        let news_id = insert_news_item(&store, "https://example.com/a").await;
        let now = Utc::now();

        let signal_id = store
            .try_create_if_under_limit(sample_signal(news_id), now, chrono_tz::Europe::Moscow, 5)
            .await
            .unwrap()
            .unwrap();

        let signal = sqlx::query_as::<_, signals::SignalRow>("SELECT * FROM signals WHERE id = ?")
            .bind(signal_id)
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(signal.news_item_id, news_id);

        let incidents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incidents")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(incidents, 1);
    }

    #[tokio::test]
    async fn second_signal_same_region_and_type_joins_existing_incident() {
        let store = test_store().await;
        let now = Utc::now();
        let a = insert_news_item(&store, "https://example.com/a").await;
        let b = insert_news_item(&store, "https://example.com/b").await;

        store
            .try_create_if_under_limit(sample_signal(a), now, chrono_tz::Europe::Moscow, 5)
            .await
            .unwrap();
        store
            .try_create_if_under_limit(sample_signal(b), now + chrono::Duration::hours(1), chrono_tz::Europe::Moscow, 5)
            .await
            .unwrap();

        let incidents: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incidents")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(incidents, 1);

        let count: i64 = sqlx::query_scalar("SELECT signal_count FROM incidents")
            .fetch_one(&store.pool)
            .await
            .unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn daily_signal_limit_suppresses_once_reached() {
        let store = test_store().await;
        let now = Utc::now();

        for i in 0..2 {
            let news_id = insert_news_item(&store, &format!("https://example.com/{i}")).await;
            let result = store
                .try_create_if_under_limit(sample_signal(news_id), now, chrono_tz::Europe::Moscow, 2)
                .await
                .unwrap();
            assert!(result.is_some());
        }

        let news_id = insert_news_item(&store, "https://example.com/overflow").await;
        let result = store
            .try_create_if_under_limit(sample_signal(news_id), now, chrono_tz::Europe::Moscow, 2)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn find_similar_recent_matches_within_window_only() {
        let store = test_store().await;
        let now = Utc::now();
        let news_id = insert_news_item(&store, "https://example.com/a").await;
        store
            .try_create_if_under_limit(sample_signal(news_id), now, chrono_tz::Europe::Moscow, 5)
            .await
            .unwrap();

        let recent = store
            .find_similar_recent(
                EventType::Accident,
                Some("Тульская область"),
                ObjectKind::Water,
                now + chrono::Duration::hours(1),
                24,
            )
            .await
            .unwrap();
        assert!(recent.is_some());

        let too_late = store
            .find_similar_recent(
                EventType::Accident,
                Some("Тульская область"),
                ObjectKind::Water,
                now + chrono::Duration::hours(25),
                24,
            )
            .await
            .unwrap();
        assert!(too_late.is_none());
    }

    #[tokio::test]
    async fn retention_removes_old_non_signal_terminal_items_but_keeps_sent() {
        let store = test_store().await;
        let old = Utc::now() - chrono::Duration::days(40);

        let filtered_id = store
            .insert_raw(NewNewsItem {
                title: "t".to_string(),
                text: "b".to_string(),
                source_id: "11111111-1111-1111-1111-111111111111".to_string(),
                source_name: "source".to_string(),
                raw_url: "https://example.com/old".to_string(),
                normalized_url: "https://example.com/old".to_string(),
                published_at: None,
                collected_at: old,
                region: None,
                filter1_score: 0,
                simhash: "xyz".to_string(),
            })
            .await
            .unwrap();
        store
            .update_status(filtered_id, vestnik_common::types::NewsStatus::Filtered)
            .await
            .unwrap();

        let sent_id = store
            .insert_raw(NewNewsItem {
                title: "t".to_string(),
                text: "b".to_string(),
                source_id: "11111111-1111-1111-1111-111111111111".to_string(),
                source_name: "source".to_string(),
                raw_url: "https://example.com/old-sent".to_string(),
                normalized_url: "https://example.com/old-sent".to_string(),
                published_at: None,
                collected_at: old,
                region: None,
                filter1_score: 5,
                simhash: "xyz2".to_string(),
            })
            .await
            .unwrap();
        store
            .update_status(sent_id, vestnik_common::types::NewsStatus::Sent)
            .await
            .unwrap();

        let report = store.run_retention(Utc::now()).await.unwrap();
        assert_eq!(report.news_deleted, 1);
        assert!(store.get(filtered_id).await.unwrap().is_none());
        assert!(store.get(sent_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn config_overrides_apply_onto_loaded_settings() {
        let store = test_store().await;
        store
            .set_override("thresholds.llm_relevance", "0.75", "admin", Utc::now())
            .await
            .unwrap();
        let settings = store.load_settings().await.unwrap();
        assert_eq!(settings.thresholds.llm_relevance, 0.75);
    }
}
