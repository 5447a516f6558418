use serde::{Deserialize, Serialize};

use super::assembler::AssemblyState;
use crate::protocol::mapping::{ConversationAnchor, TranslatedRequest};

/// Identifies the truncated message so the backend can keep writing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationHandle {
    pub conversation_id: String,
    pub parent_message_id: String,
}

/// Handle for resuming the answer, present only when the call was truncated.
#[must_use]
pub fn continuation_for(state: &AssemblyState) -> Option<ContinuationHandle> {
    if !state.truncated {
        return None;
    }
    match (&state.last_conversation_id, &state.last_message_id) {
        (Some(conversation_id), Some(message_id)) => Some(ContinuationHandle {
            conversation_id: conversation_id.clone(),
            parent_message_id: message_id.clone(),
        }),
        _ => {
            tracing::warn!("answer was truncated but upstream sent no conversation ids");
            None
        }
    }
}

/// Follow-up request that resumes `previous` at `handle`.
///
/// No messages are resent; model, stream flag and history setting carry over.
#[must_use]
pub fn follow_up_request(
    previous: &TranslatedRequest,
    handle: ContinuationHandle,
) -> TranslatedRequest {
    TranslatedRequest {
        messages: Vec::new(),
        model: previous.model.clone(),
        stream: previous.stream,
        history_disabled: previous.history_disabled,
        anchor: ConversationAnchor::Resume(handle),
    }
}

/// How many automatic follow-up requests one answer may still use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationBudget {
    remaining: u32,
}

impl ContinuationBudget {
    #[must_use]
    pub fn new(max_continuations: u32) -> Self {
        Self {
            remaining: max_continuations,
        }
    }

    #[must_use]
    pub fn has_remaining(&self) -> bool {
        self.remaining > 0
    }

    /// Take one follow-up from the budget. Returns false when exhausted.
    pub fn try_consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::upstream::UpstreamMessage;

    fn truncated_state() -> AssemblyState {
        AssemblyState {
            accumulated_text: "partial answer".to_string(),
            role_emitted: true,
            finish_reason: "max_tokens".to_string(),
            truncated: true,
            last_conversation_id: Some("c1".to_string()),
            last_message_id: Some("m1".to_string()),
            turn_completed: false,
        }
    }

    #[test]
    fn handle_only_for_truncated_state() {
        let handle = continuation_for(&truncated_state()).unwrap();
        assert_eq!(
            handle,
            ContinuationHandle {
                conversation_id: "c1".to_string(),
                parent_message_id: "m1".to_string(),
            }
        );

        let mut complete = truncated_state();
        complete.truncated = false;
        complete.finish_reason = "stop".to_string();
        assert_eq!(continuation_for(&complete), None);
    }

    #[test]
    fn missing_ids_produce_no_handle() {
        let mut state = truncated_state();
        state.last_conversation_id = None;
        assert_eq!(continuation_for(&state), None);
    }

    #[test]
    fn follow_up_resumes_conversation() {
        let previous = TranslatedRequest {
            messages: vec![UpstreamMessage::text(
                "id".to_string(),
                "user".to_string(),
                "write a long story".to_string(),
            )],
            model: "gpt-4".to_string(),
            stream: true,
            history_disabled: false,
            anchor: ConversationAnchor::Fresh {
                parent_message_id: "p0".to_string(),
            },
        };
        let handle = continuation_for(&truncated_state()).unwrap();
        let next = follow_up_request(&previous, handle);

        assert_eq!(next.action(), "continue");
        assert!(next.messages.is_empty());
        assert_eq!(next.conversation_id(), Some("c1"));
        assert_eq!(next.parent_message_id(), "m1");
        assert_eq!(next.model, "gpt-4");
        assert!(next.stream);
        assert!(!next.history_disabled);
    }

    #[test]
    fn budget_counts_down() {
        let mut budget = ContinuationBudget::new(2);
        assert!(budget.try_consume());
        assert!(budget.has_remaining());
        assert!(budget.try_consume());
        assert!(!budget.has_remaining());
        assert!(!budget.try_consume());
        assert!(!ContinuationBudget::new(0).has_remaining());
    }
}
