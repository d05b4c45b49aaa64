//! Classification request/response shapes (SPEC_FULL.md §4.9).

use vestnik_common::types::{EventType, LlmAction, ObjectKind};

#[derive(Debug, Clone)]
pub struct ClassificationRequest<'a> {
    pub title: &'a str,
    pub source_name: &'a str,
    pub region: Option<&'a str>,
    /// Already bounded to the caller's chosen extract; the client further
    /// truncates to 1500 characters before it goes into the prompt.
    pub text: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub event_type: EventType,
    pub relevance: f64,
    pub urgency: u8,
    pub object: ObjectKind,
    pub why: String,
    pub action: LlmAction,
}

impl Classification {
    /// Convenience predicate for tests and ad hoc triage — not the decision
    /// path used by the formatter, which applies thresholds in the order
    /// described by SPEC_FULL.md §4.10.
    pub fn should_send_signal(&self) -> bool {
        self.relevance >= 0.6 && self.urgency >= 3 && matches!(self.action, LlmAction::Call | LlmAction::Watch)
    }
}

#[derive(Debug, Clone)]
pub struct UsageEntry {
    pub at: chrono::DateTime<chrono::Utc>,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cost: f64,
    pub latency_ms: u64,
    pub status: &'static str,
    pub error_category: Option<&'static str>,
}
