//! In-memory paired transport.
//!
//! `ChannelTransport::pair()` yields two connected transports: whatever one
//! side sends, the other receives. Used for in-process client/server wiring
//! and throughout the integration tests.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{Transport, TransportReceiver, TransportResult, TransportSender};

pub struct ChannelSender {
    tx: mpsc::UnboundedSender<String>,
}

pub struct ChannelReceiver {
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl TransportSender for ChannelSender {
    async fn send(&mut self, message: &str) -> TransportResult<()> {
        // A dropped peer is a clean close, not an error worth surfacing to
        // the writer task.
        let _ = self.tx.send(message.to_string());
        Ok(())
    }
}

#[async_trait]
impl TransportReceiver for ChannelReceiver {
    async fn receive(&mut self) -> TransportResult<Option<String>> {
        Ok(self.rx.recv().await)
    }
}

pub struct ChannelTransport;

impl ChannelTransport {
    /// Two transports wired back-to-back.
    pub fn pair() -> (Transport, Transport) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        let left = Transport::new(
            Box::new(ChannelSender { tx: a_tx }),
            Box::new(ChannelReceiver { rx: b_rx }),
        );
        let right = Transport::new(
            Box::new(ChannelSender { tx: b_tx }),
            Box::new(ChannelReceiver { rx: a_rx }),
        );
        (left, right)
    }
}
