use bytes::Bytes;

use crate::protocol::error_shapes::{openai_error_payload, stream_error_payload};
use crate::stream::sse::sse_data_frame;

/// An upstream non-success response, already turned into the downstream
/// status and payload it should produce.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedError {
    pub status: http::StatusCode,
    pub payload: serde_json::Value,
}

/// Error type used across all modules.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Failed to build upstream request: {0}")]
    Build(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Upstream rejected the request: status={}", .0.status.as_u16())]
    UpstreamStatus(ClassifiedError),
    #[error("Upstream reported an error in the stream: {0}")]
    UpstreamSemantic(serde_json::Value),
    #[error("Downstream client disconnected")]
    ClientDisconnected,
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    BadGateway,
    ServerError,
}

impl BridgeError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            BridgeError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            BridgeError::Transport(_) => ErrorCategory::BadGateway,
            BridgeError::Config(_)
            | BridgeError::Build(_)
            | BridgeError::UpstreamStatus(_)
            | BridgeError::UpstreamSemantic(_)
            | BridgeError::ClientDisconnected
            | BridgeError::Internal(_) => ErrorCategory::ServerError,
        }
    }
}

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::BadGateway => http::StatusCode::BAD_GATEWAY,
        ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Format an error for the downstream client, returning (`status_code`, JSON body).
#[must_use]
pub fn format_error(err: &BridgeError) -> (http::StatusCode, serde_json::Value) {
    match err {
        BridgeError::UpstreamStatus(classified) => {
            (classified.status, classified.payload.clone())
        }
        BridgeError::UpstreamSemantic(error) => (
            http::StatusCode::INTERNAL_SERVER_ERROR,
            stream_error_payload(error),
        ),
        other => {
            let cat = other.category();
            (
                http_status_for_category(cat),
                openai_error_payload(cat, &other.to_string()),
            )
        }
    }
}

/// Render an error as an inline event-stream record, for failures that
/// happen after the response status has already been sent.
#[must_use]
pub fn inline_error_frame(err: &BridgeError) -> Bytes {
    let (_, body) = format_error(err);
    match serde_json::to_vec(&body) {
        Ok(json) => sse_data_frame(&json),
        Err(_) => sse_data_frame(br#"{"error":{"message":"Internal error","type":"server_error","param":null,"code":"server_error"}}"#),
    }
}

// ---------------------------------------------------------------------------
// Axum integration
// ---------------------------------------------------------------------------

/// Convert a `BridgeError` into an axum JSON response.
#[must_use]
pub fn into_axum_response(err: &BridgeError) -> axum::response::Response {
    use axum::response::IntoResponse;
    let (status, body) = format_error(err);
    (status, axum::Json(body)).into_response()
}

impl axum::response::IntoResponse for BridgeError {
    fn into_response(self) -> axum::response::Response {
        into_axum_response(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_map_to_bad_gateway() {
        let (status, body) = format_error(&BridgeError::Transport("connection reset".into()));
        assert_eq!(status, http::StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["message"], "Transport error: connection reset");
    }

    #[test]
    fn build_errors_map_to_internal() {
        let (status, _) = format_error(&BridgeError::Build("bad header".into()));
        assert_eq!(status, http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn classified_errors_keep_upstream_status_and_payload() {
        let classified = ClassifiedError {
            status: http::StatusCode::TOO_MANY_REQUESTS,
            payload: serde_json::json!({"error": {"message": "slow down"}}),
        };
        let (status, body) = format_error(&BridgeError::UpstreamStatus(classified.clone()));
        assert_eq!(status, http::StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body, classified.payload);
    }

    #[test]
    fn semantic_errors_surface_verbatim() {
        let upstream = serde_json::json!({"message": "conversation not found", "code": 404});
        let (status, body) = format_error(&BridgeError::UpstreamSemantic(upstream.clone()));
        assert_eq!(status, http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], upstream);
    }

    #[test]
    fn inline_error_frame_is_a_data_record() {
        let frame = inline_error_frame(&BridgeError::UpstreamSemantic(serde_json::json!("boom")));
        assert_eq!(&frame[..], b"data: {\"error\":\"boom\"}\n\n");
    }
}
