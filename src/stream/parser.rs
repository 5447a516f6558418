use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use memchr::memchr_iter;

use super::sse::{is_done_payload, DATA_PREFIX};
use super::{CompletionSignal, MessageDelta, UpstreamEvent, ASSISTANT_ROLE};
use crate::error::BridgeError;
use crate::protocol::upstream::StreamEnvelope;

/// Incremental line parser.
///
/// Feed it raw byte chunks split at arbitrary boundaries; complete lines are
/// decoded into [`UpstreamEvent`]s.
#[derive(Debug, Default)]
pub struct EventParser {
    buffer: Vec<u8>,
    read_offset: usize,
    finished: bool,
}

impl EventParser {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a terminator or error event has been produced.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed raw bytes and append the events of every completed line.
    pub fn feed_into(&mut self, chunk: &[u8], out: &mut Vec<UpstreamEvent>) {
        if self.finished {
            return;
        }
        self.buffer.extend_from_slice(chunk);

        let mut processed_up_to = self.read_offset;
        let mut finished = false;
        let scan_start = self.read_offset;
        for rel_pos in memchr_iter(b'\n', &self.buffer[scan_start..]) {
            let line_end = scan_start + rel_pos;
            let line = &self.buffer[processed_up_to..line_end];
            processed_up_to = line_end + 1;
            if let Some(event) = parse_line(line) {
                finished = is_terminal(&event);
                out.push(event);
                if finished {
                    break;
                }
            }
        }

        if finished {
            self.finish_buffer();
            return;
        }

        self.read_offset = processed_up_to;
        if self.read_offset == self.buffer.len() {
            self.buffer.clear();
            self.read_offset = 0;
        } else if self.read_offset >= 8 * 1024 || self.read_offset >= self.buffer.len() / 2 {
            self.buffer.drain(..self.read_offset);
            self.read_offset = 0;
        }
    }

    /// Flush a trailing line that arrived without a newline at end of input.
    pub fn finish_into(&mut self, out: &mut Vec<UpstreamEvent>) {
        if self.finished {
            return;
        }
        if self.read_offset < self.buffer.len() {
            if let Some(event) = parse_line(&self.buffer[self.read_offset..]) {
                out.push(event);
            }
        }
        self.finish_buffer();
    }

    fn finish_buffer(&mut self) {
        self.finished = true;
        self.buffer = Vec::new();
        self.read_offset = 0;
    }
}

fn is_terminal(event: &UpstreamEvent) -> bool {
    matches!(
        event,
        UpstreamEvent::StreamTerminator | UpstreamEvent::ErrorEvent(_)
    )
}

/// Decode one stream line. Returns `None` for lines that carry nothing usable.
#[must_use]
pub fn parse_line(line: &[u8]) -> Option<UpstreamEvent> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.len() < DATA_PREFIX.len() {
        return None;
    }
    let payload = line.strip_prefix(DATA_PREFIX)?;
    if is_done_payload(payload) {
        return Some(UpstreamEvent::StreamTerminator);
    }
    match serde_json::from_slice::<StreamEnvelope>(payload) {
        Ok(envelope) => event_from_envelope(envelope),
        Err(err) => {
            tracing::trace!(error = %err, "skipping undecodable upstream line");
            None
        }
    }
}

fn event_from_envelope(envelope: StreamEnvelope) -> Option<UpstreamEvent> {
    if let Some(error) = envelope.error.filter(|error| !error.is_null()) {
        return Some(UpstreamEvent::ErrorEvent(error));
    }
    let message = envelope.message?;
    let finish_details = message.metadata.finish_details.map(|details| details.kind);
    let end_turn = message.end_turn.filter(|marker| !marker.is_null());

    if end_turn.is_some() && message.author.role == ASSISTANT_ROLE {
        return Some(UpstreamEvent::CompletionSignal(CompletionSignal {
            message_id: message.id,
            conversation_id: envelope.conversation_id,
            finish_details,
        }));
    }

    Some(UpstreamEvent::MessageDelta(MessageDelta {
        role: message.author.role,
        parts: message.content.parts.unwrap_or_default(),
        message_type: message.metadata.message_type,
        end_turn,
        finish_details,
        message_id: message.id,
        conversation_id: envelope.conversation_id,
    }))
}

/// Lazily turn an upstream response body into a stream of events.
///
/// A read error ends the stream with a [`BridgeError::Transport`] item; a
/// body that ends without `[DONE]` simply ends the stream.
pub fn upstream_event_stream<S, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<UpstreamEvent, BridgeError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    futures_util::stream::unfold(
        (
            Box::pin(byte_stream),
            EventParser::new(),
            Vec::<UpstreamEvent>::with_capacity(8),
            VecDeque::<UpstreamEvent>::with_capacity(8),
            false,
        ),
        |(mut stream, mut parser, mut parsed, mut pending, mut exhausted)| async move {
            loop {
                if let Some(event) = pending.pop_front() {
                    return Some((Ok(event), (stream, parser, parsed, pending, exhausted)));
                }
                if exhausted || parser.is_finished() {
                    return None;
                }
                match stream.as_mut().next().await {
                    Some(Ok(chunk)) => parser.feed_into(&chunk, &mut parsed),
                    Some(Err(err)) => {
                        exhausted = true;
                        let err = BridgeError::Transport(format!(
                            "Upstream stream read failed: {err}"
                        ));
                        return Some((Err(err), (stream, parser, parsed, pending, exhausted)));
                    }
                    None => {
                        exhausted = true;
                        parser.finish_into(&mut parsed);
                    }
                }
                pending.extend(parsed.drain(..));
            }
        },
    )
}
