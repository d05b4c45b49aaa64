//! HTML listing-page fetcher: scrapes anchors whose href contains one of a
//! source's configured path substrings (e.g. `/news/`, `/press/`)
//! (SPEC_FULL.md §4.8).

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use vestnik_common::VestnikError;

use crate::types::{RawItem, Source};
use crate::user_agent;

const MAX_LINKS: usize = 20;

fn anchor_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<a\s+[^>]*href\s*=\s*["']([^"']+)["'][^>]*>(.*?)</a>"#).unwrap()
    })
}

fn tag_strip_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<[^>]+>").unwrap())
}

pub async fn fetch(client: &reqwest::Client, source: &Source) -> Result<Vec<RawItem>, VestnikError> {
    let resp = client
        .get(&source.url)
        .header("User-Agent", user_agent::pick(source.id))
        .send()
        .await
        .map_err(|e| VestnikError::Fetch(format!("{}: {e}", source.url)))?;

    let resp = resp
        .error_for_status()
        .map_err(|e| VestnikError::Fetch(format!("{}: {e}", source.url)))?;

    let html = resp
        .text()
        .await
        .map_err(|e| VestnikError::Fetch(format!("{}: failed to read body: {e}", source.url)))?;

    Ok(extract_news_anchors(&html, &source.url, &source.link_path_substrings)
        .into_iter()
        .map(|(url, title)| RawItem {
            source_id: source.id,
            source_name: source.name.clone(),
            url,
            title,
            raw_html: String::new(),
            published_at: None,
            region_hint: source.region_hint.clone(),
        })
        .collect())
}

/// Resolves relative hrefs against `base_url`, keeps only links containing
/// one of `path_substrings`, strips inner tags from the anchor text to get a
/// plain title, deduplicates by URL, and caps at `MAX_LINKS`.
fn extract_news_anchors(html: &str, base_url: &str, path_substrings: &[String]) -> Vec<(String, String)> {
    let base = url::Url::parse(base_url).ok();
    let mut seen = HashSet::new();
    let mut out = Vec::new();

    for caps in anchor_regex().captures_iter(html) {
        let href = &caps[1];
        let resolved = if href.starts_with("http://") || href.starts_with("https://") {
            href.to_string()
        } else if let Some(base) = &base {
            match base.join(href) {
                Ok(u) => u.to_string(),
                Err(_) => continue,
            }
        } else {
            continue;
        };

        if !path_substrings.iter().any(|p| resolved.contains(p.as_str())) {
            continue;
        }
        if !seen.insert(resolved.clone()) {
            continue;
        }

        let title = tag_strip_regex()
            .replace_all(&caps[2], "")
            .trim()
            .to_string();
        out.push((resolved, title));

        if out.len() >= MAX_LINKS {
            break;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_only_matching_path_anchors_with_text() {
        let html = r#"
            <a href="/news/123">Авария на водоканале</a>
            <a href="/about">О компании</a>
            <a href="/press/456">Релиз для СМИ</a>
        "#;
        let links = extract_news_anchors(html, "https://example.ru", &["/news/".to_string(), "/press/".to_string()]);
        assert_eq!(
            links,
            vec![
                ("https://example.ru/news/123".to_string(), "Авария на водоканале".to_string()),
                ("https://example.ru/press/456".to_string(), "Релиз для СМИ".to_string()),
            ]
        );
    }

    #[test]
    fn deduplicates_repeated_links() {
        let html = r#"<a href="/news/1">A</a><a href="/news/1">A again</a>"#;
        let links = extract_news_anchors(html, "https://example.ru", &["/news/".to_string()]);
        assert_eq!(links.len(), 1);
    }

    #[test]
    fn absolute_links_pass_through_unresolved() {
        let html = r#"<a href="https://other.ru/news/9">Заголовок</a>"#;
        let links = extract_news_anchors(html, "https://example.ru", &["/news/".to_string()]);
        assert_eq!(links[0].0, "https://other.ru/news/9");
    }

    #[test]
    fn caps_at_max_links() {
        let mut html = String::new();
        for i in 0..30 {
            html.push_str(&format!(r#"<a href="/news/{i}">Item {i}</a>"#));
        }
        let links = extract_news_anchors(&html, "https://example.ru", &["/news/".to_string()]);
        assert_eq!(links.len(), MAX_LINKS);
    }
}
