use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};

use crate::error::{into_axum_response, BridgeError};
use crate::state::AppState;
use crate::transport::build_models_call;

/// Relay the official model list, status and body unchanged.
pub async fn handler(State(state): State<Arc<AppState>>) -> Response {
    let proxy = state.proxy();
    let call = build_models_call(&state.upstream, proxy.as_deref());
    let response = match state.transport.send(&call).await {
        Ok(response) => response,
        Err(err) => return into_axum_response(&err),
    };

    let status = response.status();
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(err) => {
            let err = BridgeError::Transport(format!("Failed to read model list: {err}"));
            return into_axum_response(&err);
        }
    };
    if !status.is_success() {
        tracing::warn!(status = status.as_u16(), "model list request rejected");
    }

    (
        status,
        [(header::CONTENT_TYPE, HeaderValue::from_static("application/json"))],
        Body::from(body),
    )
        .into_response()
}
