use crate::error::BridgeError;
use crate::protocol::openai_chat::ChatCompletionRequest;
use crate::protocol::upstream::UpstreamMessage;
use crate::stream::continuation::ContinuationHandle;
use crate::util::random_uuid;

/// Upstream model used for any `gpt-4*` client model.
pub const GPT4_UPSTREAM_MODEL: &str = "gpt-4";
/// Upstream model used for every other client model.
pub const DEFAULT_UPSTREAM_MODEL: &str = "text-davinci-002-render-sha";

/// Where a request attaches to the upstream conversation tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationAnchor {
    /// New conversation under a freshly generated parent id.
    Fresh { parent_message_id: String },
    /// Resume a truncated answer.
    Resume(ContinuationHandle),
}

/// Downstream chat request mapped into the upstream shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedRequest {
    pub messages: Vec<UpstreamMessage>,
    pub model: String,
    pub stream: bool,
    pub history_disabled: bool,
    pub anchor: ConversationAnchor,
}

impl TranslatedRequest {
    /// Upstream `action` for this request.
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self.anchor {
            ConversationAnchor::Fresh { .. } => "next",
            ConversationAnchor::Resume(_) => "continue",
        }
    }

    #[must_use]
    pub fn parent_message_id(&self) -> &str {
        match &self.anchor {
            ConversationAnchor::Fresh { parent_message_id } => parent_message_id,
            ConversationAnchor::Resume(handle) => &handle.parent_message_id,
        }
    }

    #[must_use]
    pub fn conversation_id(&self) -> Option<&str> {
        match &self.anchor {
            ConversationAnchor::Fresh { .. } => None,
            ConversationAnchor::Resume(handle) => Some(&handle.conversation_id),
        }
    }
}

#[must_use]
pub fn upstream_model_for(client_model: &str) -> &'static str {
    if client_model.starts_with("gpt-4") {
        GPT4_UPSTREAM_MODEL
    } else {
        DEFAULT_UPSTREAM_MODEL
    }
}

/// Map a downstream chat request into a fresh upstream conversation request.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidRequest`] when the request has no messages.
pub fn translate_chat_request(
    request: &ChatCompletionRequest,
    history_disabled: bool,
) -> Result<TranslatedRequest, BridgeError> {
    if request.messages.is_empty() {
        return Err(BridgeError::InvalidRequest(
            "messages must contain at least one message".to_string(),
        ));
    }

    let messages = request
        .messages
        .iter()
        .map(|message| UpstreamMessage::text(random_uuid(), message.role.clone(), message.text()))
        .collect();

    Ok(TranslatedRequest {
        messages,
        model: upstream_model_for(&request.model).to_string(),
        stream: request.is_stream(),
        history_disabled,
        anchor: ConversationAnchor::Fresh {
            parent_message_id: random_uuid(),
        },
    })
}
