//! Bounded-concurrency fetch across all enabled sources, with per-request
//! retry/backoff and health accounting (SPEC_FULL.md §4.8).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Semaphore;
use tracing::warn;
use uuid::Uuid;

use crate::types::{RawItem, Source, SourceHealth, SourceKind};
use crate::{rss, web};

#[derive(Debug, Clone, Copy)]
pub struct FetchConfig {
    pub max_concurrency: usize,
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 20,
            timeout: Duration::from_secs(15),
            retries: 3,
        }
    }
}

/// Runs every enabled source in the bounded-concurrency group, retrying each
/// with exponential backoff plus jitter, and returns everything fetched.
/// Health is mutated in place; a source exhausting its retries contributes
/// zero items and never aborts the run for the other sources.
///
/// `SearchFeed` sources are not dispatched here — they need a caller-supplied
/// query term per cycle and are issued individually via
/// [`crate::search_feed::fetch`].
pub async fn fetch_all(
    sources: &[Source],
    health: &mut HashMap<Uuid, SourceHealth>,
    config: &FetchConfig,
) -> Vec<RawItem> {
    let client = match reqwest::Client::builder().timeout(config.timeout).build() {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "failed to build HTTP client for fan-out");
            return Vec::new();
        }
    };
    let client = Arc::new(client);
    let semaphore = Arc::new(Semaphore::new(config.max_concurrency));

    let enabled: Vec<&Source> = sources
        .iter()
        .filter(|s| s.kind != SourceKind::SearchFeed)
        .filter(|s| !health.get(&s.id).map(SourceHealth::is_disabled).unwrap_or(false))
        .collect();

    let mut tasks = Vec::new();
    for source in enabled {
        let client = Arc::clone(&client);
        let semaphore = Arc::clone(&semaphore);
        let source = source.clone();
        let retries = config.retries;
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            let result = fetch_with_retries(&client, &source, retries).await;
            (source.id, result)
        }));
    }

    let mut items = Vec::new();
    for task in tasks {
        let (source_id, result) = match task.await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "fetch task panicked");
                continue;
            }
        };

        let entry = health
            .entry(source_id)
            .or_insert_with(|| SourceHealth::new(source_id));
        match result {
            Ok(mut fetched) => {
                entry.record_success(chrono::Utc::now());
                items.append(&mut fetched);
            }
            Err(e) => {
                warn!(source_id = %source_id, error = %e, "source fetch failed after retries");
                entry.record_failure(e.to_string());
            }
        }
    }

    items
}

async fn fetch_with_retries(
    client: &reqwest::Client,
    source: &Source,
    retries: u32,
) -> Result<Vec<RawItem>, vestnik_common::VestnikError> {
    let mut attempt = 0u32;
    loop {
        let result = match source.kind {
            SourceKind::Rss => rss::fetch_feed(client, &source.url, source).await,
            SourceKind::Web => web::fetch(client, source).await,
            SourceKind::SearchFeed => unreachable!("SearchFeed sources are excluded from fan-out"),
        };

        match result {
            Ok(items) => return Ok(items),
            Err(e) if attempt < retries => {
                let backoff = Duration::from_millis(500 * 2u64.pow(attempt));
                let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..300));
                warn!(
                    source_id = %source.id,
                    attempt = attempt + 1,
                    error = %e,
                    "retrying source fetch after backoff"
                );
                tokio::time::sleep(backoff + jitter).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_sources_are_skipped_without_any_fetch() {
        let source = Source {
            id: Uuid::new_v4(),
            name: "Disabled".to_string(),
            kind: SourceKind::Rss,
            url: "https://example.invalid/feed.xml".to_string(),
            query_template: None,
            link_path_substrings: Vec::new(),
            region_hint: None,
        };
        let mut health = HashMap::new();
        let mut h = SourceHealth::new(source.id);
        h.is_disabled = true;
        health.insert(source.id, h);

        let items = fetch_all(&[source.clone()], &mut health, &FetchConfig::default()).await;
        assert!(items.is_empty());
        assert_eq!(health[&source.id].total_fetches, 0);
    }

    #[tokio::test]
    async fn search_feed_sources_are_excluded_from_fanout() {
        let source = Source {
            id: Uuid::new_v4(),
            name: "Search".to_string(),
            kind: SourceKind::SearchFeed,
            url: "https://example.invalid/search".to_string(),
            query_template: Some("https://example.invalid/search?q={query}".to_string()),
            link_path_substrings: Vec::new(),
            region_hint: None,
        };
        let mut health = HashMap::new();
        let items = fetch_all(&[source.clone()], &mut health, &FetchConfig::default()).await;
        assert!(items.is_empty());
        assert!(!health.contains_key(&source.id));
    }
}
