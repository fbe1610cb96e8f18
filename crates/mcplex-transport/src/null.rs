//! Null transport: discards sends, reports end-of-stream on receive.
//!
//! For servers that manage I/O themselves and only need a session object.

use async_trait::async_trait;

use crate::{Transport, TransportReceiver, TransportResult, TransportSender};

pub struct NullSender;
pub struct NullReceiver;

#[async_trait]
impl TransportSender for NullSender {
    async fn send(&mut self, _message: &str) -> TransportResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TransportReceiver for NullReceiver {
    async fn receive(&mut self) -> TransportResult<Option<String>> {
        Ok(None)
    }
}

pub struct NullTransport;

impl NullTransport {
    pub fn new() -> Transport {
        Transport::new(Box::new(NullSender), Box::new(NullReceiver))
    }
}
