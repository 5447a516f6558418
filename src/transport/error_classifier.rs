use crate::error::{BridgeError, ClassifiedError};
use crate::protocol::error_shapes::{unknown_upstream_error_payload, upstream_detail_payload};

const LOGGED_BODY_MAX_LEN: usize = 500;

/// Status line as the backend renders it, e.g. `429 Too Many Requests`.
#[must_use]
pub fn status_phrase(status: http::StatusCode) -> String {
    match status.canonical_reason() {
        Some(reason) => format!("{} {reason}", status.as_u16()),
        None => status.as_u16().to_string(),
    }
}

/// Turn a non-success status and its body into the downstream error.
///
/// Any JSON object keeps the upstream status and forwards its `detail`
/// field, `null` when absent. Anything else becomes a 500 carrying the raw
/// body.
#[must_use]
pub fn classify_upstream_error(status: http::StatusCode, body: &[u8]) -> ClassifiedError {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(mut object)) => ClassifiedError {
            status,
            payload: upstream_detail_payload(
                object.remove("detail").unwrap_or(serde_json::Value::Null),
                &status_phrase(status),
            ),
        },
        _ => ClassifiedError {
            status: http::StatusCode::INTERNAL_SERVER_ERROR,
            payload: unknown_upstream_error_payload(&String::from_utf8_lossy(body)),
        },
    }
}

/// Consume a non-success response and classify it.
pub async fn classify_response(response: reqwest::Response) -> BridgeError {
    let status = response.status();
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(err) => {
            tracing::warn!(error = %err, "failed to read upstream error body");
            bytes::Bytes::new()
        }
    };
    tracing::warn!(
        status = status.as_u16(),
        body = %truncate_for_log(&body),
        "upstream rejected conversation request"
    );
    BridgeError::UpstreamStatus(classify_upstream_error(status, &body))
}

fn truncate_for_log(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= LOGGED_BODY_MAX_LEN {
        return text.into_owned();
    }
    let mut end = LOGGED_BODY_MAX_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_phrase_includes_reason() {
        assert_eq!(
            status_phrase(http::StatusCode::TOO_MANY_REQUESTS),
            "429 Too Many Requests"
        );
        assert_eq!(status_phrase(http::StatusCode::UNAUTHORIZED), "401 Unauthorized");
        let unusual = http::StatusCode::from_u16(599).unwrap();
        assert_eq!(status_phrase(unusual), "599");
    }

    #[test]
    fn detail_body_keeps_upstream_status() {
        let classified = classify_upstream_error(
            http::StatusCode::TOO_MANY_REQUESTS,
            br#"{"detail": "rate limited"}"#,
        );
        assert_eq!(classified.status, http::StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(classified.payload["error"]["message"], "rate limited");
        assert_eq!(classified.payload["error"]["type"], "429 Too Many Requests");
        assert_eq!(classified.payload["error"]["code"], "error");
    }

    #[test]
    fn structured_detail_is_copied() {
        let classified = classify_upstream_error(
            http::StatusCode::UNAUTHORIZED,
            br#"{"detail": {"code": "token_expired", "message": "expired"}}"#,
        );
        assert_eq!(
            classified.payload["error"]["message"],
            serde_json::json!({"code": "token_expired", "message": "expired"})
        );
    }

    #[test]
    fn non_json_body_is_unknown_error() {
        let classified =
            classify_upstream_error(http::StatusCode::GATEWAY_TIMEOUT, b"gateway timeout");
        assert_eq!(classified.status, http::StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(classified.payload["error"]["message"], "Unknown error");
        assert_eq!(classified.payload["error"]["type"], "internal_server_error");
        assert_eq!(classified.payload["error"]["code"], "500");
        assert_eq!(classified.payload["error"]["details"], "gateway timeout");
    }

    #[test]
    fn object_without_detail_keeps_status_with_null_message() {
        let classified = classify_upstream_error(
            http::StatusCode::FORBIDDEN,
            br#"{"error": "cf challenge"}"#,
        );
        assert_eq!(classified.status, http::StatusCode::FORBIDDEN);
        assert!(classified.payload["error"]["message"].is_null());
        assert_eq!(classified.payload["error"]["type"], "403 Forbidden");
        assert_eq!(classified.payload["error"]["code"], "error");
    }

    #[test]
    fn non_object_json_is_unknown_error() {
        let bodies: [&[u8]; 3] = [br#"["detail"]"#, b"\"overloaded\"", b"42"];
        for body in bodies {
            let classified = classify_upstream_error(http::StatusCode::BAD_GATEWAY, body);
            assert_eq!(classified.status, http::StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(classified.payload["error"]["message"], "Unknown error");
        }
    }

    #[test]
    fn log_truncation_respects_char_boundaries() {
        let body = "é".repeat(400);
        let logged = truncate_for_log(body.as_bytes());
        assert!(logged.ends_with("..."));
        assert!(logged.len() <= LOGGED_BODY_MAX_LEN + 3);
    }
}
