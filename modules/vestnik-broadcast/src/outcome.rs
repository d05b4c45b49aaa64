//! Per-recipient delivery outcome classification (SPEC_FULL.md §4.13, §9
//! redesign note: wrap chat-provider exceptions into an internal enum so the
//! broadcast policy itself stays pure and provider-agnostic).

use teloxide::ApiError;
use teloxide::RequestError;

#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    Sent,
    Forbidden,
    NotFound,
    FloodWait(u64),
    Other(String),
}

/// Maps a `teloxide` send error onto the internal outcome taxonomy. Unknown
/// `ApiError` variants (the type is `#[non_exhaustive]`) fall through to
/// `Other` rather than being guessed at.
pub fn classify_error(err: &RequestError) -> DeliveryOutcome {
    match err {
        RequestError::Api(ApiError::BotBlocked) => DeliveryOutcome::Forbidden,
        RequestError::Api(ApiError::BotKicked) => DeliveryOutcome::Forbidden,
        RequestError::Api(ApiError::UserDeactivated) => DeliveryOutcome::Forbidden,
        RequestError::Api(ApiError::ChatNotFound) => DeliveryOutcome::NotFound,
        RequestError::Api(ApiError::Unknown(msg)) if msg.to_lowercase().contains("chat not found") => {
            DeliveryOutcome::NotFound
        }
        RequestError::RetryAfter(duration) => DeliveryOutcome::FloodWait(duration.as_secs()),
        other => DeliveryOutcome::Other(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn bot_blocked_classifies_as_forbidden() {
        let err = RequestError::Api(ApiError::BotBlocked);
        assert!(matches!(classify_error(&err), DeliveryOutcome::Forbidden));
    }

    #[test]
    fn chat_not_found_classifies_as_not_found() {
        let err = RequestError::Api(ApiError::ChatNotFound);
        assert!(matches!(classify_error(&err), DeliveryOutcome::NotFound));
    }

    #[test]
    fn retry_after_carries_the_wait_seconds() {
        let err = RequestError::RetryAfter(Duration::from_secs(30));
        match classify_error(&err) {
            DeliveryOutcome::FloodWait(secs) => assert_eq!(secs, 30),
            other => panic!("expected FloodWait, got {other:?}"),
        }
    }
}
