//! Strict-JSON response parsing and schema validation (SPEC_FULL.md §4.9).

use schemars::JsonSchema;
use serde::Deserialize;
use vestnik_common::types::{DecisionCode, EventType, LlmAction, ObjectKind};

use crate::types::Classification;

#[derive(Debug, Deserialize, JsonSchema)]
struct RawClassification {
    event_type: String,
    relevance: f64,
    urgency: i64,
    object: String,
    why: String,
    action: String,
}

/// Builds the `json_schema` response-format payload sent alongside the chat
/// request, so the provider enforces field presence at generation time in
/// addition to our own post-parse validation.
pub fn response_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(RawClassification);
    let mut value = serde_json::to_value(schema).unwrap_or_default();

    if let serde_json::Value::Object(map) = &mut value {
        map.remove("$schema");
        map.remove("title");
        map.insert("additionalProperties".to_string(), serde_json::Value::Bool(false));
        if let Some(serde_json::Value::Object(props)) = map.get("properties") {
            let required: Vec<serde_json::Value> = props
                .keys()
                .map(|k| serde_json::Value::String(k.clone()))
                .collect();
            map.insert("required".to_string(), serde_json::Value::Array(required));
        }
    }

    value
}

/// Strips an optional ```json fenced-code wrapper, parses the JSON, and
/// validates every field is in range. A syntactically valid JSON object with
/// an out-of-range value is still rejected as `LLM_INVALID_JSON`, matching
/// the reference client's strict schema check.
pub fn parse_classification(raw: &str) -> Result<Classification, DecisionCode> {
    let stripped = strip_code_fence(raw);

    let parsed: RawClassification =
        serde_json::from_str(stripped).map_err(|_| DecisionCode::LlmInvalidJson)?;

    let event_type = match parsed.event_type.as_str() {
        "accident" => EventType::Accident,
        "outage" => EventType::Outage,
        "repair" => EventType::Repair,
        "other" => EventType::Other,
        _ => return Err(DecisionCode::LlmInvalidJson),
    };

    if !(0.0..=1.0).contains(&parsed.relevance) {
        return Err(DecisionCode::LlmInvalidJson);
    }

    if !(1..=5).contains(&parsed.urgency) {
        return Err(DecisionCode::LlmInvalidJson);
    }

    let object = match parsed.object.as_str() {
        "water" => ObjectKind::Water,
        "heat" => ObjectKind::Heat,
        "industrial" => ObjectKind::Industrial,
        "unknown" => ObjectKind::Unknown,
        _ => return Err(DecisionCode::LlmInvalidJson),
    };

    let action = match parsed.action.as_str() {
        "call" => LlmAction::Call,
        "watch" => LlmAction::Watch,
        "ignore" => LlmAction::Ignore,
        _ => return Err(DecisionCode::LlmInvalidJson),
    };

    Ok(Classification {
        event_type,
        relevance: parsed.relevance,
        urgency: parsed.urgency as u8,
        object,
        why: parsed.why,
        action,
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_prefix = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_prefix.strip_suffix("```").unwrap_or(without_prefix).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_json() {
        let raw = r#"{"event_type":"accident","relevance":0.9,"urgency":4,"object":"water","why":"burst main","action":"call"}"#;
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.event_type, EventType::Accident);
        assert_eq!(c.urgency, 4);
        assert!(c.should_send_signal());
    }

    #[test]
    fn strips_fenced_code_block() {
        let raw = "```json\n{\"event_type\":\"repair\",\"relevance\":0.5,\"urgency\":2,\"object\":\"heat\",\"why\":\"scheduled\",\"action\":\"watch\"}\n```";
        let c = parse_classification(raw).unwrap();
        assert_eq!(c.event_type, EventType::Repair);
    }

    #[test]
    fn rejects_out_of_range_relevance() {
        let raw = r#"{"event_type":"accident","relevance":1.5,"urgency":4,"object":"water","why":"x","action":"call"}"#;
        assert_eq!(parse_classification(raw), Err(DecisionCode::LlmInvalidJson));
    }

    #[test]
    fn rejects_out_of_range_urgency() {
        let raw = r#"{"event_type":"accident","relevance":0.5,"urgency":9,"object":"water","why":"x","action":"call"}"#;
        assert_eq!(parse_classification(raw), Err(DecisionCode::LlmInvalidJson));
    }

    #[test]
    fn rejects_unknown_enum_value() {
        let raw = r#"{"event_type":"flood","relevance":0.5,"urgency":3,"object":"water","why":"x","action":"call"}"#;
        assert_eq!(parse_classification(raw), Err(DecisionCode::LlmInvalidJson));
    }

    #[test]
    fn rejects_malformed_json() {
        assert_eq!(parse_classification("not json at all"), Err(DecisionCode::LlmInvalidJson));
    }

    #[test]
    fn response_schema_forbids_additional_properties() {
        let schema = response_schema();
        assert_eq!(schema["additionalProperties"], serde_json::Value::Bool(false));
        assert!(schema["required"].as_array().unwrap().contains(&serde_json::Value::String("event_type".to_string())));
    }
}
