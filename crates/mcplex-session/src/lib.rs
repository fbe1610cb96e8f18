//! # mcplex-session: the bidirectional session runtime
//!
//! One [`Session`] is one MCP peer over one transport, in either role. It
//! owns the request tracker (id allocation and pending-callback table), the
//! timeout manager, the cancellation tables for both directions, and the
//! dispatcher that routes inbound messages to request handlers, notification
//! handlers, or pending-request completions.
//!
//! Two tasks are spawned per session: a writer draining the outbound FIFO
//! into the transport, and a reader feeding inbound lines through the
//! dispatcher. Request handlers run in their own tasks so a slow handler
//! never blocks the read loop, which is also what lets a cancellation
//! notification overtake the request it cancels.

pub mod cancellation;
pub mod context;
pub mod dispatcher;
pub mod outbound;
pub mod prelude;
pub mod request;
pub mod session;
pub mod timeout;
pub mod tracker;

pub use cancellation::{CancellationManager, CancellationSource, CancellationToken};
pub use context::RequestContext;
pub use dispatcher::{Dispatcher, HandlerRegistry, NotificationHandler, RequestHandler};
pub use outbound::Outbound;
pub use request::InflightRequest;
pub use session::{InitializeGate, Session, SessionBuilder, SessionConfig};
pub use timeout::TimeoutManager;
pub use tracker::{PendingRequest, RequestTracker, TrackerStats};

use mcplex_protocol::JsonRpcErrorObject;
use std::time::Duration;

/// Errors surfaced to callers of the session's request API.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The peer answered with a JSON-RPC error, or a local condition
    /// (timeout, cancellation) was drained into one.
    #[error("{0}")]
    Rpc(JsonRpcErrorObject),

    /// The local wait bound elapsed before any completion fired.
    #[error("no response within {0:?}")]
    Timeout(Duration),

    /// The transport closed underneath the session.
    #[error("session closed")]
    Closed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SessionError {
    /// The JSON-RPC error object this failure corresponds to.
    pub fn error_object(&self) -> JsonRpcErrorObject {
        match self {
            SessionError::Rpc(error) => error.clone(),
            SessionError::Timeout(_) => JsonRpcErrorObject::request_timeout(),
            SessionError::Closed => {
                JsonRpcErrorObject::internal_error(Some("session closed".to_string()))
            }
            SessionError::Serialization(e) => {
                JsonRpcErrorObject::internal_error(Some(e.to_string()))
            }
        }
    }

    /// The JSON-RPC error code, for callers that branch on it.
    pub fn code(&self) -> i64 {
        self.error_object().code
    }
}
