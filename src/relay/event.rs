//! Inbound chat event record.

use serde::{Deserialize, Serialize};

/// A single chat event as posted by the upstream plugin.
///
/// The transport shell decodes this from the JSON carried in the webhook's
/// `data` field. `content` and `timestamp` are required: a payload missing
/// either fails deserialization and is rejected before it can reach the
/// fingerprint stage or the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatEvent {
    /// Name of the message source. Absent for unauthored events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Message body.
    pub content: String,

    /// Event time in milliseconds since the epoch.
    pub timestamp: i64,

    /// True for system-originated messages, which are forwarded verbatim
    /// without author prefix or sanitization.
    #[serde(default)]
    pub broadcast: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_payload() {
        let event: ChatEvent = serde_json::from_str(
            r#"{"author":"Bob","content":"hello","timestamp":1690000000123,"broadcast":false}"#,
        )
        .unwrap();

        assert_eq!(event.author.as_deref(), Some("Bob"));
        assert_eq!(event.content, "hello");
        assert_eq!(event.timestamp, 1690000000123);
        assert!(!event.broadcast);
    }

    #[test]
    fn author_and_broadcast_are_optional() {
        let event: ChatEvent =
            serde_json::from_str(r#"{"content":"Server restarting","timestamp":1690000000000}"#)
                .unwrap();

        assert_eq!(event.author, None);
        assert!(!event.broadcast);
    }

    #[test]
    fn missing_content_is_rejected() {
        let result: Result<ChatEvent, _> =
            serde_json::from_str(r#"{"author":"Bob","timestamp":1690000000123}"#);
        assert!(result.is_err());
    }

    #[test]
    fn missing_timestamp_is_rejected() {
        let result: Result<ChatEvent, _> =
            serde_json::from_str(r#"{"author":"Bob","content":"hello"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn fractional_timestamp_is_rejected() {
        let result: Result<ChatEvent, _> =
            serde_json::from_str(r#"{"content":"hello","timestamp":1690000000123.5}"#);
        assert!(result.is_err());
    }
}
