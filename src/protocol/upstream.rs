use serde::{Deserialize, Deserializer, Serialize};

/// Body of `POST <conversation endpoint>`.
#[derive(Debug, Serialize)]
pub struct ConversationRequestBody<'a> {
    pub action: &'a str,
    pub messages: &'a [UpstreamMessage],
    pub parent_message_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<&'a str>,
    pub model: &'a str,
    pub history_and_training_disabled: bool,
    pub stream: bool,
}

/// One outbound conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamMessage {
    pub id: String,
    pub author: MessageAuthor,
    pub content: MessageContent,
}

impl UpstreamMessage {
    #[must_use]
    pub fn text(id: String, role: String, text: String) -> Self {
        Self {
            id,
            author: MessageAuthor { role },
            content: MessageContent {
                content_type: "text".to_string(),
                parts: vec![text],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAuthor {
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    pub content_type: String,
    pub parts: Vec<String>,
}

/// One decoded `data:` line of the upstream event stream.
#[derive(Debug, Default, Deserialize)]
pub struct StreamEnvelope {
    #[serde(default)]
    pub message: Option<EnvelopeMessage>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// `null` on every healthy line.
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// Consumed envelope fields. The backend sends `null` for several of them
/// on tool and system lines, which decodes to the empty default.
#[derive(Debug, Default, Deserialize)]
pub struct EnvelopeMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: EnvelopeAuthor,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: EnvelopeContent,
    /// Any non-null value counts as an end-of-turn marker.
    #[serde(default)]
    pub end_turn: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: EnvelopeMetadata,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnvelopeAuthor {
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnvelopeContent {
    #[serde(default)]
    pub parts: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EnvelopeMetadata {
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub finish_details: Option<FinishDetails>,
}

#[derive(Debug, Deserialize)]
pub struct FinishDetails {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub kind: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
