use futures_util::{Stream, StreamExt};

use super::assembler::Assembler;
use super::continuation::{continuation_for, ContinuationHandle};
use super::sink::DownstreamSink;
use super::sse::done_frame;
use super::UpstreamEvent;
use crate::error::BridgeError;
use crate::protocol::openai_chat::encoder::ChunkEncoder;

/// Whether the client receives live chunks or one aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Stream,
    Buffered,
}

impl OutputMode {
    #[must_use]
    pub fn from_stream_flag(stream: bool) -> Self {
        if stream {
            OutputMode::Stream
        } else {
            OutputMode::Buffered
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            OutputMode::Stream => "stream",
            OutputMode::Buffered => "buffered",
        }
    }
}

/// Per-pass settings decided by the caller.
#[derive(Debug, Clone, Copy)]
pub struct PassOptions {
    pub mode: OutputMode,
    /// An earlier pass of the same answer already sent the role chunk.
    pub role_announced: bool,
    /// The caller will resume a truncated answer, so the closing records
    /// are left to the final pass.
    pub continuation_allowed: bool,
}

/// Result of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    pub text: String,
    pub finish_reason: String,
    pub continuation: Option<ContinuationHandle>,
    pub role_announced: bool,
    /// Upstream echoed an end-of-turn record before the stream ended.
    pub turn_completed: bool,
}

/// Drive one upstream call's events into `sink`.
///
/// End of input is handled like the `[DONE]` sentinel. In stream mode the
/// pass closes with a final record and `[DONE]` unless it hands over to a
/// continuation.
///
/// # Errors
///
/// - [`BridgeError::UpstreamSemantic`] for an error envelope; nothing else is written.
/// - [`BridgeError::Transport`] when reading the upstream body fails.
/// - [`BridgeError::ClientDisconnected`] as soon as the sink reports closure,
///   even while upstream is quiet or produces no new text; upstream is not drained.
pub async fn translate<S, K>(
    events: S,
    options: PassOptions,
    encoder: &ChunkEncoder,
    sink: &mut K,
) -> Result<PassOutcome, BridgeError>
where
    S: Stream<Item = Result<UpstreamEvent, BridgeError>>,
    K: DownstreamSink,
{
    let mut events = std::pin::pin!(events);
    let mut assembler = Assembler::new(options.role_announced);
    let streaming = options.mode == OutputMode::Stream;

    loop {
        let next = tokio::select! {
            biased;
            () = sink.closed() => {
                tracing::debug!("client went away mid-pass; abandoning upstream");
                return Err(BridgeError::ClientDisconnected);
            }
            next = events.next() => next,
        };
        let Some(event) = next else { break };
        match event? {
            UpstreamEvent::MessageDelta(delta) => {
                let step = assembler.apply(&delta);
                if !streaming {
                    continue;
                }
                if step.announce_role {
                    sink.send(encoder.role_chunk()?).await?;
                }
                if let Some(fragment) = step.fragment.as_deref() {
                    sink.send(encoder.content_chunk(fragment)?).await?;
                }
            }
            UpstreamEvent::CompletionSignal(signal) => assembler.complete_turn(&signal),
            UpstreamEvent::ErrorEvent(error) => {
                tracing::warn!(error = %error, "upstream reported an error mid-stream");
                return Err(BridgeError::UpstreamSemantic(error));
            }
            UpstreamEvent::StreamTerminator => break,
        }
    }

    let continuation = continuation_for(assembler.state());
    let hand_over = continuation.is_some() && options.continuation_allowed;
    if streaming && !hand_over {
        if !assembler.state().role_emitted {
            sink.send(encoder.role_chunk()?).await?;
            assembler.mark_role_emitted();
        }
        sink.send(encoder.final_chunk(&assembler.state().finish_reason)?)
            .await?;
        sink.send(done_frame()).await?;
    }

    let state = assembler.into_state();
    Ok(PassOutcome {
        text: state.accumulated_text,
        finish_reason: state.finish_reason,
        continuation,
        role_announced: state.role_emitted,
        turn_completed: state.turn_completed,
    })
}
