//! Outbound handle: the FIFO into the writer task.
//!
//! Cloneable and cheap; handlers and registries hold one of these rather
//! than a reference back to the session, which keeps the object graph
//! acyclic.

use mcplex_protocol::{
    JsonRpcErrorObject, JsonRpcMessage, JsonRpcNotification, JsonRpcResponse, RequestId,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Clone)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<JsonRpcMessage>,
}

impl Outbound {
    pub(crate) fn new(tx: mpsc::UnboundedSender<JsonRpcMessage>) -> Self {
        Self { tx }
    }

    /// Enqueue a message for the writer task. Send order from a single
    /// caller is wire order. A closed session drops the message.
    pub fn send(&self, message: JsonRpcMessage) {
        if self.tx.send(message).is_err() {
            debug!("outbound message dropped: session closed");
        }
    }

    /// Enqueue a notification.
    pub fn notify(&self, method: &str, params: Option<Value>) {
        self.send(JsonRpcMessage::Notification(JsonRpcNotification::new(
            method, params,
        )));
    }

    /// Enqueue a success response.
    pub fn respond_ok(&self, id: RequestId, result: Value) {
        self.send(JsonRpcMessage::Response(JsonRpcResponse::success(
            id, result,
        )));
    }

    /// Enqueue an error response.
    pub fn respond_err(&self, id: RequestId, error: JsonRpcErrorObject) {
        self.send(JsonRpcMessage::Response(JsonRpcResponse::error(id, error)));
    }
}
