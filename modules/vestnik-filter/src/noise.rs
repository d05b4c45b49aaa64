//! Noise gate (SPEC_FULL.md §4.5): rejects household/off-topic chatter while
//! still letting infrastructure-relevant exceptions through.

use vestnik_common::types::DecisionCode;
use vestnik_common::NoiseFilterConfig;

const BODY_SCAN_CHARS: usize = 800;

#[derive(Debug, Clone, PartialEq)]
pub enum NoiseVerdict {
    Pass,
    PassedWithException { matched_phrase: String },
    Hard { matched_phrase: String },
}

impl NoiseVerdict {
    pub fn passed(&self) -> bool {
        !matches!(self, NoiseVerdict::Hard { .. })
    }

    pub fn decision_code(&self) -> Option<DecisionCode> {
        match self {
            NoiseVerdict::Pass => None,
            NoiseVerdict::PassedWithException { .. } => Some(DecisionCode::PassedWithException),
            NoiseVerdict::Hard { .. } => Some(DecisionCode::NoiseHardTopic),
        }
    }
}

/// The title is never truncated; the body is only scanned for its first
/// `BODY_SCAN_CHARS` characters when checking for hard/household noise
/// topics. The exception scan runs over the full untruncated text, so a
/// relevant infrastructure mention buried deep in a long article still
/// rescues the item.
pub fn check_noise(title: &str, text: &str, config: &NoiseFilterConfig) -> NoiseVerdict {
    if !config.enabled {
        return NoiseVerdict::Pass;
    }

    let truncated_body: String = text.chars().take(BODY_SCAN_CHARS).collect();
    let scan_window = format!("{title} {truncated_body}").to_lowercase();

    let hard_match = config
        .hard_negative_topics
        .iter()
        .chain(config.household_noise.iter())
        .find(|phrase| scan_window.contains(&phrase.to_lowercase()));

    let Some(hard_phrase) = hard_match else {
        return NoiseVerdict::Pass;
    };

    let full_text = format!("{title} {text}").to_lowercase();
    let exception = config
        .exception_infra_phrases
        .iter()
        .find(|phrase| full_text.contains(&phrase.to_lowercase()));

    match exception {
        Some(matched_phrase) => NoiseVerdict::PassedWithException {
            matched_phrase: matched_phrase.clone(),
        },
        None => NoiseVerdict::Hard {
            matched_phrase: hard_phrase.clone(),
        },
    }
}
