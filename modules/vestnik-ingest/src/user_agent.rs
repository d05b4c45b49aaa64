//! Deterministic User-Agent rotation by source id (SPEC_FULL.md §4.8).

use uuid::Uuid;
use vestnik_common::fnv::fnv1a;

const ROTATION: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36",
    "vestnik-ingest/0.1 (+https://example.invalid/bot)",
];

/// Always picks the same entry for the same source id, so a given source's
/// requests present a stable identity across cycles.
pub fn pick(source_id: Uuid) -> &'static str {
    let hash = fnv1a(source_id.as_bytes());
    let index = (hash as usize) % ROTATION.len();
    ROTATION[index]
}
