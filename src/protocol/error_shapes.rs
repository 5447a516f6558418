use crate::error::ErrorCategory;

/// `type` used when an upstream error body cannot be decoded.
pub const UNKNOWN_ERROR_TYPE: &str = "internal_server_error";

fn openai_error_type(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest => "invalid_request_error",
        ErrorCategory::BadGateway => "upstream_error",
        ErrorCategory::ServerError => "server_error",
    }
}

fn openai_error_code(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest => "invalid_request",
        ErrorCategory::BadGateway => "bad_gateway",
        ErrorCategory::ServerError => "server_error",
    }
}

/// Error payload for failures raised by the bridge itself.
#[must_use]
pub(crate) fn openai_error_payload(cat: ErrorCategory, message: &str) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "message": message,
            "type": openai_error_type(cat),
            "param": null,
            "code": openai_error_code(cat),
        }
    })
}

/// Error payload for an upstream rejection whose body carried a `detail` field.
///
/// `detail` is copied as-is, so structured details survive untouched.
#[must_use]
pub(crate) fn upstream_detail_payload(
    detail: serde_json::Value,
    status_phrase: &str,
) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "message": detail,
            "type": status_phrase,
            "param": null,
            "code": "error",
        }
    })
}

/// Error payload for an upstream rejection whose body could not be decoded.
#[must_use]
pub(crate) fn unknown_upstream_error_payload(raw_body: &str) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "message": "Unknown error",
            "type": UNKNOWN_ERROR_TYPE,
            "param": null,
            "code": "500",
            "details": raw_body,
        }
    })
}

/// Wraps an error object reported inside an upstream event stream.
#[must_use]
pub(crate) fn stream_error_payload(error: &serde_json::Value) -> serde_json::Value {
    serde_json::json!({ "error": error })
}
