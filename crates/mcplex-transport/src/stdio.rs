//! Newline-delimited JSON over stdio (or any byte stream).
//!
//! Outbound messages are written as a single line followed by `\n` and
//! flushed immediately; line buffering must never delay a message. Inbound
//! reads buffer until a full line has arrived, so partial deliveries are
//! invisible to the caller.

use async_trait::async_trait;
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout,
};
use tracing::trace;

use crate::{Transport, TransportReceiver, TransportResult, TransportSender};

/// Line-writing half over any async writer.
pub struct LineSender<W> {
    writer: W,
}

/// Line-reading half over any async reader.
pub struct LineReceiver<R> {
    lines: Lines<BufReader<R>>,
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> TransportSender for LineSender<W> {
    async fn send(&mut self, message: &str) -> TransportResult<()> {
        self.writer.write_all(message.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        trace!(len = message.len(), "wrote framed message");
        Ok(())
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> TransportReceiver for LineReceiver<R> {
    async fn receive(&mut self) -> TransportResult<Option<String>> {
        loop {
            match self.lines.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(Some(line)),
                None => return Ok(None),
            }
        }
    }
}

/// Stdio transport constructors.
pub struct StdioTransport;

impl StdioTransport {
    /// The process's own stdin/stdout. This is the server end of an MCP
    /// stdio session: the peer launched us and owns the other side.
    pub fn stdio() -> Transport {
        Self::from_parts(tokio::io::stdout(), tokio::io::stdin())
    }

    /// Build a newline-framed transport over arbitrary halves: a child
    /// process's pipes, a socket, or an in-memory duplex in tests.
    pub fn from_parts<W, R>(writer: W, reader: R) -> Transport
    where
        W: AsyncWrite + Unpin + Send + 'static,
        R: AsyncRead + Unpin + Send + 'static,
    {
        Transport::new(
            Box::new(LineSender { writer }),
            Box::new(LineReceiver {
                lines: BufReader::new(reader).lines(),
            }),
        )
    }
}

// Concrete aliases so the common case reads well in signatures.
pub type StdoutSender = LineSender<Stdout>;
pub type StdinReceiver = LineReceiver<Stdin>;
