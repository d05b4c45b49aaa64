//! Resolved-event gate (SPEC_FULL.md §4.4): rejects items describing an
//! already-fixed incident unless an ongoing marker says otherwise.

use vestnik_common::types::DecisionCode;
use vestnik_common::ResolvedFilterConfig;

const SCAN_WINDOW_CHARS: usize = 1500;

#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedVerdict {
    Pass,
    Resolved { matched_phrase: String },
}

impl ResolvedVerdict {
    pub fn passed(&self) -> bool {
        matches!(self, ResolvedVerdict::Pass)
    }

    pub fn decision_code(&self) -> Option<DecisionCode> {
        match self {
            ResolvedVerdict::Pass => None,
            ResolvedVerdict::Resolved { .. } => Some(DecisionCode::ResolvedEvent),
        }
    }
}

pub fn check_resolved(title: &str, text: &str, config: &ResolvedFilterConfig) -> ResolvedVerdict {
    if !config.enabled {
        return ResolvedVerdict::Pass;
    }

    let combined = format!("{title} {text}");
    let lowered: String = combined.to_lowercase().chars().take(SCAN_WINDOW_CHARS).collect();

    // Ongoing markers are checked first and short-circuit: a confirmed
    // ongoing marker means we never need to know which resolved phrase matched.
    let ongoing = config
        .allow_if_still_ongoing_words
        .iter()
        .find(|w| lowered.contains(&w.to_lowercase()));

    let hard_match = config
        .hard_resolved_phrases
        .iter()
        .find(|p| lowered.contains(&p.to_lowercase()));

    let resolved_match = match hard_match {
        Some(p) => Some(p.clone()),
        None => config
            .soft_resolved_words
            .iter()
            .find(|w| lowered.contains(&w.to_lowercase()))
            .cloned(),
    };

    match (resolved_match, ongoing) {
        (Some(matched_phrase), None) => ResolvedVerdict::Resolved { matched_phrase },
        _ => ResolvedVerdict::Pass,
    }
}
