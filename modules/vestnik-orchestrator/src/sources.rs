//! Static source seed list (SPEC_FULL.md §4.8). The reference deployment has
//! no `sources` table — operators extend coverage by redeploying with a
//! longer list here, the same way the teacher's scout seeds its curated city
//! coverage as code rather than config.

use uuid::Uuid;
use vestnik_ingest::{Source, SourceKind};

fn rss(id: &str, name: &str, url: &str, region_hint: Option<&str>) -> Source {
    Source {
        id: Uuid::parse_str(id).expect("hardcoded source id must be a valid UUID"),
        name: name.to_string(),
        kind: SourceKind::Rss,
        url: url.to_string(),
        query_template: None,
        link_path_substrings: Vec::new(),
        region_hint: region_hint.map(str::to_string),
    }
}

fn web(id: &str, name: &str, url: &str, link_path_substrings: &[&str], region_hint: Option<&str>) -> Source {
    Source {
        id: Uuid::parse_str(id).expect("hardcoded source id must be a valid UUID"),
        name: name.to_string(),
        kind: SourceKind::Web,
        url: url.to_string(),
        query_template: None,
        link_path_substrings: link_path_substrings.iter().map(|s| s.to_string()).collect(),
        region_hint: region_hint.map(str::to_string),
    }
}

fn search_feed(id: &str, name: &str, query_template: &str) -> Source {
    Source {
        id: Uuid::parse_str(id).expect("hardcoded source id must be a valid UUID"),
        name: name.to_string(),
        kind: SourceKind::SearchFeed,
        url: query_template.to_string(),
        query_template: Some(query_template.to_string()),
        link_path_substrings: Vec::new(),
        region_hint: None,
    }
}

/// The reference coverage list: a handful of national wire RSS feeds, a
/// search-feed template for the keyword query run every cycle, and a couple
/// of regional utility-operator sites crawled by anchor-link discovery.
pub fn default_sources() -> Vec<Source> {
    vec![
        rss(
            "8f14e45f-ceea-467e-9e87-b1f5a9d1a001",
            "РИА Новости — Все новости",
            "https://ria.ru/export/rss2/archive/index.xml",
            None,
        ),
        rss(
            "8f14e45f-ceea-467e-9e87-b1f5a9d1a002",
            "ТАСС — Главные новости",
            "https://tass.ru/rss/v2.xml",
            None,
        ),
        rss(
            "8f14e45f-ceea-467e-9e87-b1f5a9d1a003",
            "Коммерсантъ — Происшествия",
            "https://www.kommersant.ru/RSS/section-incident.xml",
            None,
        ),
        search_feed(
            "8f14e45f-ceea-467e-9e87-b1f5a9d1a004",
            "Google News — авария водоканал",
            "https://news.google.com/rss/search?q={query}&hl={lang}&gl={country}",
        ),
        web(
            "8f14e45f-ceea-467e-9e87-b1f5a9d1a005",
            "Мосводоканал — Новости",
            "https://www.mosvodokanal.ru/press/news/",
            &["/press/news/"],
            Some("Москва"),
        ),
        web(
            "8f14e45f-ceea-467e-9e87-b1f5a9d1a006",
            "Водоканал Санкт-Петербурга — Новости",
            "https://www.vodokanal.spb.ru/presscentr/novosti/",
            &["/novosti/"],
            Some("Санкт-Петербург"),
        ),
    ]
}
