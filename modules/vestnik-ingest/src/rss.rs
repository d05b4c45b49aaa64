//! RSS/Atom/JSON feed fetcher (SPEC_FULL.md §4.8).

use chrono::{DateTime, Duration, Utc};
use vestnik_common::VestnikError;

use crate::types::{RawItem, Source};
use crate::user_agent;

const MAX_ITEMS_PER_FEED: usize = 20;
const MAX_AGE_DAYS: i64 = 30;

/// Fetches and parses a feed, discarding entries with no resolvable link and
/// pre-filtering anything older than `MAX_AGE_DAYS` before the item even
/// reaches the pipeline's own Freshness Gate.
pub async fn fetch_feed(
    client: &reqwest::Client,
    feed_url: &str,
    source: &Source,
) -> Result<Vec<RawItem>, VestnikError> {
    let resp = client
        .get(feed_url)
        .header("User-Agent", user_agent::pick(source.id))
        .send()
        .await
        .map_err(|e| VestnikError::Fetch(format!("{feed_url}: {e}")))?;

    let resp = resp
        .error_for_status()
        .map_err(|e| VestnikError::Fetch(format!("{feed_url}: {e}")))?;

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| VestnikError::Fetch(format!("{feed_url}: failed to read body: {e}")))?;

    let feed = feed_rs::parser::parse(&bytes[..])
        .map_err(|e| VestnikError::Fetch(format!("{feed_url}: failed to parse feed: {e}")))?;

    let cutoff = Utc::now() - Duration::days(MAX_AGE_DAYS);

    let mut items: Vec<(RawItem, Option<DateTime<Utc>>)> = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let url = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| entry.id.starts_with("http").then(|| entry.id.clone()))?;

            let published_at = entry
                .published
                .or(entry.updated)
                .map(|dt| dt.with_timezone(&Utc));

            if let Some(date) = published_at {
                if date < cutoff {
                    return None;
                }
            }

            let title = entry.title.map(|t| t.content).unwrap_or_default();
            let raw_html = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();

            Some((
                RawItem {
                    source_id: source.id,
                    source_name: source.name.clone(),
                    url,
                    title,
                    raw_html,
                    published_at,
                    region_hint: source.region_hint.clone(),
                },
                published_at,
            ))
        })
        .collect();

    items.sort_by(|a, b| b.1.cmp(&a.1));
    items.truncate(MAX_ITEMS_PER_FEED);

    Ok(items.into_iter().map(|(item, _)| item).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceKind;
    use uuid::Uuid;

    fn source() -> Source {
        Source {
            id: Uuid::new_v4(),
            name: "Test Feed".to_string(),
            kind: SourceKind::Rss,
            url: "https://example.invalid/feed.xml".to_string(),
            query_template: None,
            link_path_substrings: Vec::new(),
            region_hint: Some("Свердловская область".to_string()),
        }
    }

    #[test]
    fn source_smoke() {
        let s = source();
        assert_eq!(s.kind, SourceKind::Rss);
    }
}
