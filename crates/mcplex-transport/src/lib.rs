//! # mcplex-transport: framed message transports
//!
//! A transport delivers exactly one complete JSON message per `receive()`
//! and accepts exactly one per `send()`. Framing is the transport's own
//! business: stdio uses newline-delimited UTF-8 JSON and flushes after every
//! message; an HTTP+SSE transport would frame on event boundaries. The
//! session layer never sees partial messages.
//!
//! Transports are handed over as a send half and a receive half so the
//! session can run independent reader and writer tasks without sharing a
//! lock across both directions.

use async_trait::async_trait;

pub mod channel;
pub mod null;
pub mod stdio;

pub use channel::ChannelTransport;
pub use null::NullTransport;
pub use stdio::StdioTransport;

/// Transport-level errors: I/O and framing only, no protocol logic.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport closed")]
    Closed,
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Outbound half: deliver a single framed message.
#[async_trait]
pub trait TransportSender: Send {
    /// Send one complete JSON message. The implementation appends its own
    /// terminator and flushes before returning.
    async fn send(&mut self, message: &str) -> TransportResult<()>;
}

/// Inbound half: yield one complete JSON message per call.
#[async_trait]
pub trait TransportReceiver: Send {
    /// Receive the next complete message, or `None` on clean end of stream.
    /// Partial deliveries are buffered internally and never surfaced.
    async fn receive(&mut self) -> TransportResult<Option<String>>;
}

pub type BoxedSender = Box<dyn TransportSender>;
pub type BoxedReceiver = Box<dyn TransportReceiver>;

/// A connected transport, as the send/receive half pair the session consumes.
pub struct Transport {
    pub sender: BoxedSender,
    pub receiver: BoxedReceiver,
}

impl Transport {
    pub fn new(sender: BoxedSender, receiver: BoxedReceiver) -> Self {
        Self { sender, receiver }
    }

    pub fn into_split(self) -> (BoxedSender, BoxedReceiver) {
        (self.sender, self.receiver)
    }
}
