use std::future::Future;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::BridgeError;

/// The downstream client went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("downstream sink closed")]
pub struct SinkClosed;

impl From<SinkClosed> for BridgeError {
    fn from(_: SinkClosed) -> Self {
        BridgeError::ClientDisconnected
    }
}

/// Destination of downstream bytes.
///
/// A completed `send` means the frame was handed to the connection; there is
/// no separate flush step.
pub trait DownstreamSink: Send {
    fn send(&mut self, frame: Bytes) -> impl Future<Output = Result<(), SinkClosed>> + Send;

    /// Resolves once the client has gone away. Sinks that cannot observe
    /// that never resolve.
    fn closed(&self) -> impl Future<Output = ()> + Send;
}

impl DownstreamSink for Vec<Bytes> {
    async fn send(&mut self, frame: Bytes) -> Result<(), SinkClosed> {
        self.push(frame);
        Ok(())
    }

    async fn closed(&self) {
        std::future::pending::<()>().await;
    }
}

/// Sink feeding a response body through a bounded channel.
///
/// The bound applies backpressure: a slow client slows down upstream reads.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
    frames_sent: usize,
}

impl ChannelSink {
    #[must_use]
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self { tx, frames_sent: 0 }
    }

    /// Number of frames delivered so far.
    #[must_use]
    pub fn frames_sent(&self) -> usize {
        self.frames_sent
    }
}

impl DownstreamSink for ChannelSink {
    async fn send(&mut self, frame: Bytes) -> Result<(), SinkClosed> {
        self.tx.send(frame).await.map_err(|_| SinkClosed)?;
        self.frames_sent += 1;
        Ok(())
    }

    async fn closed(&self) {
        self.tx.closed().await;
    }
}
