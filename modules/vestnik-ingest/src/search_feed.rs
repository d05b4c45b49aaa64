//! Search-feed fetcher: a query template is expanded into a concrete feed
//! URL (e.g. a Google News RSS search), then parsed exactly like a plain RSS
//! feed (SPEC_FULL.md §4.8).

use vestnik_common::VestnikError;

use crate::rss;
use crate::types::{RawItem, Source};

/// Expands `{query}`, `{lang}`, and `{country}` placeholders in the
/// template. Unset placeholders are left untouched rather than erroring,
/// since a source may only need a subset of them.
pub fn build_url(template: &str, query: &str, lang: Option<&str>, country: Option<&str>) -> String {
    let mut url = template.replace("{query}", &urlencode(query));
    if let Some(lang) = lang {
        url = url.replace("{lang}", lang);
    }
    if let Some(country) = country {
        url = url.replace("{country}", country);
    }
    url
}

fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

pub async fn fetch(
    client: &reqwest::Client,
    source: &Source,
    query: &str,
    lang: Option<&str>,
    country: Option<&str>,
) -> Result<Vec<RawItem>, VestnikError> {
    let template = source
        .query_template
        .as_deref()
        .ok_or_else(|| VestnikError::Config(format!("source {} has no query_template", source.id)))?;
    let feed_url = build_url(template, query, lang, country);
    rss::fetch_feed(client, &feed_url, source).await
}
