//! Prompt construction for the classification call (SPEC_FULL.md §4.9).

use crate::types::ClassificationRequest;

pub const MAX_TEXT_CHARS: usize = 1500;

const SYSTEM_PROMPT: &str = "You are a news triage assistant for a utility incident monitoring \
service. Read the article and classify it. Respond with a single JSON object and nothing else: \
no prose, no markdown fences, no commentary. The object must have exactly these fields: \
\"event_type\" (one of \"accident\", \"outage\", \"repair\", \"other\"), \"relevance\" (a number \
from 0.0 to 1.0), \"urgency\" (an integer from 1 to 5), \"object\" (one of \"water\", \"heat\", \
\"industrial\", \"unknown\"), \"why\" (a short justification in Russian), and \"action\" (one of \
\"call\", \"watch\", \"ignore\"). If the article does not describe a utility incident, set \
event_type to \"other\" and action to \"ignore\".";

pub fn system_message() -> &'static str {
    SYSTEM_PROMPT
}

/// `retry` appends an explicit nudge used on the one-time invalid-JSON retry.
pub fn user_message(request: &ClassificationRequest<'_>, retry: bool) -> String {
    let truncated: String = request.text.chars().take(MAX_TEXT_CHARS).collect();
    let region = request.region.unwrap_or("unknown");

    let mut message = format!(
        "Title: {title}\nSource: {source}\nRegion: {region}\nText: {text}",
        title = request.title,
        source = request.source_name,
        region = region,
        text = truncated,
    );

    if retry {
        message.push_str(
            "\n\nYour previous reply was not valid JSON matching the schema. \
             Return strict JSON only, with no surrounding text.",
        );
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_text_to_max_chars() {
        let long_text: String = std::iter::repeat('x').take(MAX_TEXT_CHARS + 200).collect();
        let request = ClassificationRequest {
            title: "t",
            source_name: "s",
            region: None,
            text: &long_text,
        };
        let message = user_message(&request, false);
        let text_line = message.lines().find(|l| l.starts_with("Text: ")).unwrap();
        assert_eq!(text_line.trim_start_matches("Text: ").chars().count(), MAX_TEXT_CHARS);
    }

    #[test]
    fn missing_region_falls_back_to_unknown() {
        let request = ClassificationRequest {
            title: "t",
            source_name: "s",
            region: None,
            text: "body",
        };
        assert!(user_message(&request, false).contains("Region: unknown"));
    }

    #[test]
    fn retry_flag_appends_nudge() {
        let request = ClassificationRequest {
            title: "t",
            source_name: "s",
            region: Some("Tula"),
            text: "body",
        };
        assert!(user_message(&request, true).contains("strict JSON only"));
        assert!(!user_message(&request, false).contains("strict JSON only"));
    }
}
