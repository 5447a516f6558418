use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Json;
use serde_json::{json, Value};

const ALLOWED_METHODS: &str = "POST, GET, OPTIONS";

/// Answer a browser preflight for the completions route.
pub fn preflight_handler() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

/// Permissive cross-origin headers added to every response. Headers a
/// handler already set are left alone.
pub fn apply_cors_headers(headers: &mut HeaderMap) {
    headers
        .entry(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .or_insert(HeaderValue::from_static("*"));
    headers
        .entry(header::ACCESS_CONTROL_ALLOW_METHODS)
        .or_insert(HeaderValue::from_static(ALLOWED_METHODS));
    headers
        .entry(header::ACCESS_CONTROL_ALLOW_HEADERS)
        .or_insert(HeaderValue::from_static("*"));
}
