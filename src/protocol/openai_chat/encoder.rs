use bytes::Bytes;

use super::{
    ChatChoice, ChatCompletion, ChatCompletionChunk, ChatMessage, ChatUsage, ChunkChoice,
    ChunkDelta,
};
use crate::error::BridgeError;
use crate::stream::sse::sse_data_frame;
use crate::stream::ASSISTANT_ROLE;

/// Encodes downstream output for one logical answer.
///
/// Every chunk of an answer shares the same id, creation time and model.
#[derive(Debug, Clone)]
pub struct ChunkEncoder {
    id: String,
    model: String,
    created: u64,
}

impl ChunkEncoder {
    #[must_use]
    pub fn new(id: String, model: String, created: u64) -> Self {
        Self { id, model, created }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn chunk_frame(
        &self,
        delta: ChunkDelta<'_>,
        finish_reason: Option<&str>,
    ) -> Result<Bytes, BridgeError> {
        let chunk = ChatCompletionChunk {
            id: &self.id,
            object: "chat.completion.chunk",
            created: self.created,
            model: &self.model,
            choices: [ChunkChoice {
                index: 0,
                delta,
                finish_reason,
            }],
        };
        let json = serde_json::to_vec(&chunk)
            .map_err(|e| BridgeError::Internal(format!("Failed to encode chunk: {e}")))?;
        Ok(sse_data_frame(&json))
    }

    /// Chunk announcing the assistant role.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Internal`] if the chunk cannot be serialized.
    pub fn role_chunk(&self) -> Result<Bytes, BridgeError> {
        self.chunk_frame(
            ChunkDelta {
                role: Some(ASSISTANT_ROLE),
                content: None,
            },
            None,
        )
    }

    /// Chunk carrying one text fragment.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Internal`] if the chunk cannot be serialized.
    pub fn content_chunk(&self, fragment: &str) -> Result<Bytes, BridgeError> {
        self.chunk_frame(
            ChunkDelta {
                role: None,
                content: Some(fragment),
            },
            None,
        )
    }

    /// Final record: empty delta with the finish reason set.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Internal`] if the chunk cannot be serialized.
    pub fn final_chunk(&self, finish_reason: &str) -> Result<Bytes, BridgeError> {
        self.chunk_frame(ChunkDelta::default(), Some(finish_reason))
    }

    /// Complete buffered answer.
    #[must_use]
    pub fn completion(&self, text: String, finish_reason: String) -> ChatCompletion {
        ChatCompletion {
            id: self.id.clone(),
            object: "chat.completion".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage {
                    role: ASSISTANT_ROLE.to_string(),
                    content: Some(serde_json::Value::String(text)),
                },
                finish_reason,
            }],
            usage: ChatUsage::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoder() -> ChunkEncoder {
        ChunkEncoder::new(
            "chatcmpl-0000000000000001".to_string(),
            "gpt-4".to_string(),
            1_700_000_000,
        )
    }

    fn decode(frame: &Bytes) -> serde_json::Value {
        let text = std::str::from_utf8(frame).unwrap();
        let payload = text
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .expect("sse data frame");
        serde_json::from_str(payload).unwrap()
    }

    #[test]
    fn role_chunk_has_role_only() {
        let chunk = decode(&encoder().role_chunk().unwrap());
        assert_eq!(chunk["object"], "chat.completion.chunk");
        assert_eq!(chunk["id"], "chatcmpl-0000000000000001");
        assert_eq!(chunk["created"], 1_700_000_000_u64);
        assert_eq!(chunk["choices"][0]["delta"], serde_json::json!({"role": "assistant"}));
        assert!(chunk["choices"][0]["finish_reason"].is_null());
    }

    #[test]
    fn content_chunk_escapes_text() {
        let chunk = decode(&encoder().content_chunk("line \"one\"\n").unwrap());
        assert_eq!(chunk["choices"][0]["delta"]["content"], "line \"one\"\n");
        assert!(chunk["choices"][0]["delta"].get("role").is_none());
    }

    #[test]
    fn final_chunk_has_empty_delta_and_reason() {
        let chunk = decode(&encoder().final_chunk("max_tokens").unwrap());
        assert_eq!(chunk["choices"][0]["delta"], serde_json::json!({}));
        assert_eq!(chunk["choices"][0]["finish_reason"], "max_tokens");

        let chunk = decode(&encoder().final_chunk("").unwrap());
        assert_eq!(chunk["choices"][0]["finish_reason"], "");
    }

    #[test]
    fn completion_wraps_text() {
        let completion = encoder().completion("Hello world".to_string(), "stop".to_string());
        let value = serde_json::to_value(&completion).unwrap();
        assert_eq!(value["object"], "chat.completion");
        assert_eq!(value["choices"][0]["message"]["role"], "assistant");
        assert_eq!(value["choices"][0]["message"]["content"], "Hello world");
        assert_eq!(value["choices"][0]["finish_reason"], "stop");
        assert_eq!(value["usage"]["total_tokens"], 0);
    }
}
