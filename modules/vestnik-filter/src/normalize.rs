//! URL and text normalization (SPEC_FULL.md §4.1).

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use url::form_urlencoded;
use url::Url;

/// Lowercases the host, drops the fragment, removes the configured tracking
/// parameters, strips a trailing slash (except on the root path), and sorts
/// the remaining query parameters for a stable output. Returns `None` if
/// `raw` isn't a parseable URL.
pub fn normalize_url(raw: &str, params_to_remove: &[String]) -> Option<String> {
    let mut url = Url::parse(raw).ok()?;
    url.set_fragment(None);

    let remove_set: HashSet<String> = params_to_remove.iter().map(|p| p.to_lowercase()).collect();

    let mut kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !remove_set.contains(k.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    kept.sort_by(|a, b| a.0.cmp(&b.0));

    if kept.is_empty() {
        url.set_query(None);
    } else {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (k, v) in &kept {
            serializer.append_pair(k, v);
        }
        url.set_query(Some(&serializer.finish()));
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        let trimmed = path.trim_end_matches('/');
        let new_path = if trimmed.is_empty() { "/" } else { trimmed };
        url.set_path(new_path);
    }

    Some(url.to_string())
}

fn tag_strip_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<(script|style|noscript)[^>]*>.*?</\1>").unwrap())
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn sentence_split_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+").unwrap())
}

/// Strips `<script>`/`<style>`/`<noscript>` blocks (tag and content),
/// decodes the common named HTML entities, and collapses whitespace runs.
pub fn normalize_text(raw: &str) -> String {
    let without_tags = tag_strip_regex().replace_all(raw, "");
    let decoded = decode_entities(&without_tags);
    whitespace_regex()
        .replace_all(decoded.trim(), " ")
        .into_owned()
}

fn decode_entities(s: &str) -> String {
    let partial = s
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ");
    // &amp; decoded last so "&amp;lt;" doesn't get double-unescaped into "<".
    partial.replace("&amp;", "&")
}

/// Splits on sentence boundaries, keeps the first `max_sentences` sentences
/// longer than 10 characters, joins them with a single space, and truncates
/// to `max_chars`. Used to bound the LLM prompt without an extra summarization call.
pub fn extract_sentences(text: &str, max_sentences: usize, max_chars: usize) -> String {
    let mut result = String::new();
    let mut count = 0usize;

    for piece in sentence_split_regex().split(text) {
        let trimmed = piece.trim();
        if trimmed.chars().count() > 10 {
            if !result.is_empty() {
                result.push(' ');
            }
            result.push_str(trimmed);
            count += 1;
            if count >= max_sentences {
                break;
            }
        }
    }

    if result.chars().count() > max_chars {
        result = result.chars().take(max_chars).collect();
    }
    result
}
