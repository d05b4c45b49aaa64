//! Post-LLM admission decision (SPEC_FULL.md §4.10). Filter1 already gated
//! everything upstream of the LLM call; this is the last gate before a
//! signal is allowed to reach the atomic daily-limit/similarity stage.

use vestnik_common::types::{DecisionCode, LlmAction, ThresholdsConfig};
use vestnik_llm::types::Classification;

/// `Ok(())` means the classification clears every threshold and the item
/// proceeds to similarity/limit checks. `Err` carries the specific rejection
/// reason, checked in the order the external contract documents: relevance,
/// then urgency, then an explicit `ignore` action.
pub fn decide(classification: &Classification, thresholds: &ThresholdsConfig) -> Result<(), DecisionCode> {
    if classification.relevance < thresholds.llm_relevance {
        return Err(DecisionCode::LowRelevance);
    }
    if (classification.urgency as i32) < thresholds.llm_urgency {
        return Err(DecisionCode::LowUrgency);
    }
    if matches!(classification.action, LlmAction::Ignore) {
        return Err(DecisionCode::LlmActionIgnore);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vestnik_common::types::{EventType, ObjectKind};

    fn thresholds() -> ThresholdsConfig {
        ThresholdsConfig {
            filter1_to_llm: 4,
            llm_relevance: 0.6,
            llm_urgency: 3,
        }
    }

    fn classification() -> Classification {
        Classification {
            event_type: EventType::Accident,
            relevance: 0.9,
            urgency: 4,
            object: ObjectKind::Water,
            why: "burst main".to_string(),
            action: LlmAction::Call,
        }
    }

    #[test]
    fn approves_a_clean_classification() {
        assert_eq!(decide(&classification(), &thresholds()), Ok(()));
    }

    #[test]
    fn rejects_low_relevance_before_checking_urgency() {
        let mut c = classification();
        c.relevance = 0.1;
        c.urgency = 1;
        assert_eq!(decide(&c, &thresholds()), Err(DecisionCode::LowRelevance));
    }

    #[test]
    fn rejects_low_urgency() {
        let mut c = classification();
        c.urgency = 1;
        assert_eq!(decide(&c, &thresholds()), Err(DecisionCode::LowUrgency));
    }

    #[test]
    fn rejects_explicit_ignore_even_with_good_scores() {
        let mut c = classification();
        c.action = LlmAction::Ignore;
        assert_eq!(decide(&c, &thresholds()), Err(DecisionCode::LlmActionIgnore));
    }
}
