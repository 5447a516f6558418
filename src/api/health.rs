use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Liveness probe.
pub fn ping_handler() -> Json<Value> {
    Json(json!({ "message": "pong" }))
}

/// Health check handler.
/// Returns JSON with status and config summary.
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "chatbridge is running",
        "config": {
            "endpoint": state.upstream.endpoint().as_str(),
            "models_endpoint": state.upstream.models_endpoint().as_str(),
            "official_api_key_configured": !config.upstream.official_api_key.trim().is_empty(),
            "access_tokens_count": config.upstream.access_tokens.len(),
            "proxies_count": config.upstream.proxies.len(),
            "session_hint_configured": config.upstream.session_hint.as_deref().is_some_and(|hint| !hint.trim().is_empty()),
            "max_continuations": config.upstream.max_continuations,
            "history_disabled": config.upstream.history_disabled,
            "features": {
                "log_level": config.features.log_level,
            }
        }
    }))
}
