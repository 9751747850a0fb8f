//! Outbound boundary towards the content context.

use async_trait::async_trait;
use tokio::sync::mpsc;

use bitboard_core::error::{BridgeError, Result};
use bitboard_core::protocol::Outbound;

/// Where responses and callbacks go. Fails only when the content instance is gone.
#[async_trait]
pub trait ContentSink: Send + Sync {
    async fn deliver(&self, frame: Outbound) -> Result<()>;
}

/// Bounded channel sink; the receiving half is drained by a socket writer or
/// by an in-process [`crate::client::BridgeClient`].
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Outbound>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiver it feeds.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl ContentSink for ChannelSink {
    async fn deliver(&self, frame: Outbound) -> Result<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| BridgeError::Internal("content sink closed".into()))
    }
}
