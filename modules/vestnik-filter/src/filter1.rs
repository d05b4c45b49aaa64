//! Keyword scorer and LLM-admission gate (SPEC_FULL.md §4.6).

use std::collections::HashSet;

use vestnik_common::types::DecisionCode;
use vestnik_common::{Filter1GateConfig, KeywordsConfig, ThresholdsConfig, WeightsConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct Filter1Result {
    pub score: i32,
    pub matched_categories: Vec<String>,
    pub matched_negative_phrases: Vec<String>,
}

pub struct KeywordFilter<'a> {
    keywords: &'a KeywordsConfig,
    weights: &'a WeightsConfig,
    thresholds: &'a ThresholdsConfig,
    gate: &'a Filter1GateConfig,
}

impl<'a> KeywordFilter<'a> {
    pub fn new(
        keywords: &'a KeywordsConfig,
        weights: &'a WeightsConfig,
        thresholds: &'a ThresholdsConfig,
        gate: &'a Filter1GateConfig,
    ) -> Self {
        Self {
            keywords,
            weights,
            thresholds,
            gate,
        }
    }

    /// A positive category contributes its weight once no matter how many of
    /// its keywords appear; every negative keyword match subtracts the flat
    /// negative weight again, so repeated negative chatter compounds.
    pub fn score(&self, title: &str, text: &str) -> Filter1Result {
        let combined = format!("{title} {text}").to_lowercase();

        let mut matched_categories = Vec::new();
        let mut total = 0i32;

        for (category, phrases) in &self.keywords.positive {
            if phrases.iter().any(|p| combined.contains(&p.to_lowercase())) {
                matched_categories.push(category.clone());
                total += self.weights.weight_for(category);
            }
        }

        let mut matched_negative_phrases = Vec::new();
        for phrase in &self.keywords.negative {
            if combined.contains(&phrase.to_lowercase()) {
                matched_negative_phrases.push(phrase.clone());
                total += self.weights.negative;
            }
        }

        Filter1Result {
            score: total,
            matched_categories,
            matched_negative_phrases,
        }
    }

    /// Decides whether a scored item proceeds to the LLM. A strong-override
    /// phrase is checked *before* the combo gate can fail it, so a clearly
    /// urgent item bypasses an otherwise-unsatisfied category combo.
    pub fn should_send_to_llm(
        &self,
        title: &str,
        text: &str,
        result: &Filter1Result,
    ) -> (bool, DecisionCode) {
        if result.score < self.thresholds.filter1_to_llm {
            return (false, DecisionCode::Filter1BelowThreshold);
        }

        if self.gate.strong_event_override_enabled {
            let combined = format!("{title} {text}").to_lowercase();
            if self
                .gate
                .strong_event_override_phrases
                .iter()
                .any(|p| combined.contains(&p.to_lowercase()))
            {
                return (true, DecisionCode::StrongOverride);
            }
        }

        if self.gate.require_combo_to_llm {
            let matched: HashSet<&str> = result.matched_categories.iter().map(String::as_str).collect();
            let has_event = self
                .gate
                .event_categories_required
                .iter()
                .any(|c| matched.contains(c.as_str()));
            let has_object = self
                .gate
                .object_categories_required
                .iter()
                .any(|c| matched.contains(c.as_str()));
            if !(has_event && has_object) {
                return (false, DecisionCode::ComboRuleFailed);
            }
        }

        (true, DecisionCode::Passed)
    }
}
