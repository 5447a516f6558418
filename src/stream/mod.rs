//! Upstream stream handling: line parsing, answer assembly, continuation
//! detection and the async translation pass that ties them to a sink.

pub mod assembler;
pub mod continuation;
pub mod parser;
pub mod sink;
pub mod sse;
pub mod translator;

/// Role of the speaker whose deltas make up the answer.
pub const ASSISTANT_ROLE: &str = "assistant";
/// Finish-detail tag reported when generation stopped at the token budget.
pub const TOKEN_LIMIT_TAG: &str = "max_tokens";

/// Typed event decoded from one upstream stream line.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    /// Snapshot of the in-progress answer. Not necessarily usable, see
    /// [`MessageDelta::usable_text`].
    MessageDelta(MessageDelta),
    /// The assistant turn was closed; carries no new content.
    CompletionSignal(CompletionSignal),
    /// Error object reported inside an otherwise successful stream.
    ErrorEvent(serde_json::Value),
    /// `[DONE]` sentinel.
    StreamTerminator,
}

/// Message snapshot as carried by the upstream envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageDelta {
    pub role: String,
    /// Only the first part is consumed.
    pub parts: Vec<serde_json::Value>,
    pub message_type: Option<String>,
    pub end_turn: Option<serde_json::Value>,
    pub finish_details: Option<String>,
    pub message_id: String,
    pub conversation_id: Option<String>,
}

impl MessageDelta {
    /// Full answer text if this delta contributes content.
    ///
    /// Deltas from other roles, without a text part, with an unknown message
    /// type, or already carrying an end-of-turn marker are progress echoes.
    #[must_use]
    pub fn usable_text(&self) -> Option<&str> {
        if self.role != ASSISTANT_ROLE {
            return None;
        }
        if self.end_turn.as_ref().is_some_and(|marker| !marker.is_null()) {
            return None;
        }
        if !matches!(self.message_type.as_deref(), Some("next" | "continue")) {
            return None;
        }
        self.parts.first().and_then(serde_json::Value::as_str)
    }
}

/// End-of-turn echo of the assistant message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionSignal {
    pub message_id: String,
    pub conversation_id: Option<String>,
    pub finish_details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(role: &str, message_type: Option<&str>, parts: Vec<serde_json::Value>) -> MessageDelta {
        MessageDelta {
            role: role.to_string(),
            parts,
            message_type: message_type.map(str::to_string),
            ..MessageDelta::default()
        }
    }

    #[test]
    fn usable_text_requires_assistant_role() {
        let d = delta("user", Some("next"), vec![serde_json::json!("hi")]);
        assert_eq!(d.usable_text(), None);
        let d = delta("assistant", Some("next"), vec![serde_json::json!("hi")]);
        assert_eq!(d.usable_text(), Some("hi"));
    }

    #[test]
    fn usable_text_requires_known_message_type() {
        let d = delta("assistant", Some("continue"), vec![serde_json::json!("x")]);
        assert_eq!(d.usable_text(), Some("x"));
        let d = delta("assistant", Some("variant"), vec![serde_json::json!("x")]);
        assert_eq!(d.usable_text(), None);
        let d = delta("assistant", None, vec![serde_json::json!("x")]);
        assert_eq!(d.usable_text(), None);
    }

    #[test]
    fn usable_text_requires_text_part() {
        let d = delta("assistant", Some("next"), vec![]);
        assert_eq!(d.usable_text(), None);
        let d = delta("assistant", Some("next"), vec![serde_json::json!({"image": 1})]);
        assert_eq!(d.usable_text(), None);
    }

    #[test]
    fn end_turn_marker_discards_delta() {
        let mut d = delta("assistant", Some("next"), vec![serde_json::json!("done")]);
        d.end_turn = Some(serde_json::Value::Bool(true));
        assert_eq!(d.usable_text(), None);
        d.end_turn = Some(serde_json::Value::Null);
        assert_eq!(d.usable_text(), Some("done"));
    }
}
