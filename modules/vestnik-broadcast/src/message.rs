//! Signal message formatting (SPEC_FULL.md §4.10).
//!
//! Exactly six plain-text lines, no markup: severity banner, region, sphere,
//! essence, why, source. Translation tables live on `EventType`/`ObjectKind`
//! themselves in `vestnik-common`.

use vestnik_common::types::{EventType, ObjectKind};

const TITLE_MAX_CHARS: usize = 200;
const WHY_MAX_CHARS: usize = 300;

pub struct SignalMessageInput<'a> {
    pub event_type: EventType,
    pub urgency: u8,
    pub object_kind: ObjectKind,
    pub region: Option<&'a str>,
    pub title: &'a str,
    pub why: &'a str,
    pub source_url: &'a str,
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Renders the six-line signal body sent to subscribers. Line labels follow
/// the external interface contract verbatim; only the event-type banner uses
/// the translated (Russian) label.
pub fn format_signal(input: &SignalMessageInput<'_>) -> String {
    let region = input.region.unwrap_or("not detected");
    let title = truncate_chars(input.title, TITLE_MAX_CHARS);
    let why = truncate_chars(input.why, WHY_MAX_CHARS);

    format!(
        "🚨 SIGNAL | {} | {}/5\nRegion: {}\nSphere: {}\nEssence: {}\nWhy: {}\nSource: {}",
        input.event_type.ru_label(),
        input.urgency,
        region,
        input.object_kind.sphere(),
        title,
        why,
        input.source_url,
    )
}
