use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use futures_util::{future, stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::{inline_error_frame, BridgeError};
use crate::observability::{log_request_complete, CompletionStats};
use crate::protocol::mapping::{translate_chat_request, TranslatedRequest};
use crate::protocol::openai_chat::encoder::ChunkEncoder;
use crate::protocol::openai_chat::ChatCompletionRequest;
use crate::providers::{client_bearer, mask_credential};
use crate::state::AppState;
use crate::stream::continuation::{follow_up_request, ContinuationBudget};
use crate::stream::parser::upstream_event_stream;
use crate::stream::sink::{ChannelSink, DownstreamSink};
use crate::stream::translator::{translate, OutputMode, PassOptions};
use crate::transport::{build_upstream_call, classify_response};
use crate::util::{format_request_seq_hex, unix_now_secs};

const STREAM_CHANNEL_CAPACITY: usize = 32;

/// Everything one downstream request needs, owned so it can move into a
/// streaming task.
struct Conversation {
    state: Arc<AppState>,
    request: TranslatedRequest,
    mode: OutputMode,
    credential: String,
    proxy: Option<String>,
    encoder: ChunkEncoder,
    started_at: Instant,
}

/// Aggregate of all passes of one answer.
#[derive(Debug)]
struct ConversationSummary {
    text: String,
    finish_reason: String,
    rounds: u32,
    turn_completed: bool,
}

pub async fn handler(
    State(state): State<Arc<AppState>>,
    headers: http::HeaderMap,
    body: Bytes,
) -> Response {
    let started_at = Instant::now();
    let request: ChatCompletionRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            return BridgeError::InvalidRequest(format!("Invalid JSON body: {err}")).into_response()
        }
    };
    let translated = match translate_chat_request(&request, state.config.upstream.history_disabled)
    {
        Ok(translated) => translated,
        Err(err) => return err.into_response(),
    };

    let credential = client_bearer(&headers).map_or_else(|| state.credential(), str::to_string);
    let proxy = state.proxy();
    let encoder = ChunkEncoder::new(
        format_request_seq_hex("chatcmpl-", state.next_request_seq()),
        request.model,
        unix_now_secs(),
    );
    let mode = OutputMode::from_stream_flag(translated.stream);
    tracing::debug!(
        id = encoder.id(),
        model = encoder.model(),
        upstream_model = %translated.model,
        mode = mode.as_str(),
        messages = translated.messages.len(),
        credential = %mask_credential(&credential),
        via_proxy = proxy.is_some(),
        "chat completion request"
    );

    let conversation = Conversation {
        state,
        request: translated,
        mode,
        credential,
        proxy,
        encoder,
        started_at,
    };
    match mode {
        OutputMode::Stream => stream_response(conversation).await,
        OutputMode::Buffered => buffered_response(conversation).await,
    }
}

/// Run the first pass and any follow-ups a truncated answer earns.
async fn run_conversation<K: DownstreamSink>(
    conversation: &Conversation,
    sink: &mut K,
) -> Result<ConversationSummary, BridgeError> {
    let state = &conversation.state;
    let mut budget = ContinuationBudget::new(state.config.upstream.max_continuations);
    let mut follow_up: Option<TranslatedRequest> = None;
    let mut text = String::new();
    let mut role_announced = false;
    let mut rounds = 0u32;

    loop {
        let current = follow_up.as_ref().unwrap_or(&conversation.request);
        rounds += 1;

        let call = build_upstream_call(
            current,
            &state.upstream,
            &conversation.credential,
            conversation.proxy.as_deref(),
        )?;
        let response = state.transport.send(&call).await?;
        if response.status() != http::StatusCode::OK {
            return Err(classify_response(response).await);
        }

        let events = upstream_event_stream(response.bytes_stream());
        let options = PassOptions {
            mode: conversation.mode,
            role_announced,
            continuation_allowed: budget.has_remaining(),
        };
        let outcome = translate(events, options, &conversation.encoder, sink).await?;
        text.push_str(&outcome.text);
        role_announced = outcome.role_announced;

        match outcome.continuation {
            Some(handle) if budget.try_consume() => {
                tracing::debug!(
                    round = rounds,
                    conversation_id = %handle.conversation_id,
                    "answer truncated, continuing"
                );
                let next = follow_up_request(current, handle);
                follow_up = Some(next);
            }
            _ => {
                return Ok(ConversationSummary {
                    text,
                    finish_reason: outcome.finish_reason,
                    rounds,
                    turn_completed: outcome.turn_completed,
                })
            }
        }
    }
}

fn log_summary(conversation: &Conversation, summary: &ConversationSummary) {
    log_request_complete(
        conversation.encoder.model(),
        &CompletionStats {
            mode: conversation.mode.as_str(),
            rounds: summary.rounds,
            answer_len: summary.text.len(),
            finish_reason: &summary.finish_reason,
            turn_completed: summary.turn_completed,
        },
        conversation.started_at,
    );
}

async fn buffered_response(conversation: Conversation) -> Response {
    let mut sink: Vec<Bytes> = Vec::new();
    match run_conversation(&conversation, &mut sink).await {
        Ok(summary) => {
            log_summary(&conversation, &summary);
            Json(
                conversation
                    .encoder
                    .completion(summary.text, summary.finish_reason),
            )
            .into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "chat completion failed");
            err.into_response()
        }
    }
}

/// Start the conversation on its own task and hold the response until the
/// first frame exists, so failures before any output still get a real
/// status code.
async fn stream_response(conversation: Conversation) -> Response {
    let (tx, mut rx) = mpsc::channel::<Bytes>(STREAM_CHANNEL_CAPACITY);
    let task = tokio::spawn(async move {
        let mut sink = ChannelSink::new(tx);
        let result = run_conversation(&conversation, &mut sink).await;
        match result {
            Ok(summary) => {
                log_summary(&conversation, &summary);
                Ok(())
            }
            Err(BridgeError::ClientDisconnected) => {
                tracing::debug!(id = conversation.encoder.id(), "client disconnected mid-stream");
                Ok(())
            }
            Err(err) if sink.frames_sent() > 0 => {
                tracing::warn!(error = %err, "chat completion stream failed after output started");
                let _ = sink.send(inline_error_frame(&err)).await;
                Ok(())
            }
            Err(err) => Err(err),
        }
    });

    let Some(first) = rx.recv().await else {
        return match task.await {
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "chat completion failed");
                err.into_response()
            }
            Ok(Ok(())) => {
                BridgeError::Internal("Stream ended without output".to_string()).into_response()
            }
            Err(join_err) => {
                BridgeError::Internal(format!("Conversation task failed: {join_err}"))
                    .into_response()
            }
        };
    };

    let frames = stream::once(future::ready(first)).chain(ReceiverStream::new(rx));
    sse_ok_response(axum::body::Body::from_stream(
        frames.map(Ok::<Bytes, Infallible>),
    ))
}

fn sse_ok_response(body: axum::body::Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}
