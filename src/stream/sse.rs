use bytes::{BufMut, Bytes, BytesMut};

/// Prefix of every data line.
pub const DATA_PREFIX: &[u8] = b"data: ";
/// Payload that marks the end of a stream.
pub const DONE_SENTINEL: &[u8] = b"[DONE]";

const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// Format a data-only SSE record: `data: <payload>\n\n`.
#[must_use]
pub fn sse_data_frame(payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(DATA_PREFIX.len() + payload.len() + 2);
    out.put_slice(DATA_PREFIX);
    out.put_slice(payload);
    out.put_slice(b"\n\n");
    out.freeze()
}

/// The `[DONE]` record that ends a downstream stream.
#[must_use]
pub fn done_frame() -> Bytes {
    Bytes::from_static(DONE_FRAME)
}

/// Check if a data payload is the `[DONE]` sentinel.
#[must_use]
pub fn is_done_payload(payload: &[u8]) -> bool {
    payload.starts_with(DONE_SENTINEL)
}
