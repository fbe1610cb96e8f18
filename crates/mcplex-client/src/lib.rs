//! # mcplex-client: the client half of an MCP peer
//!
//! [`McpClient`] wraps a session with the initialize handshake and typed
//! wrappers for the server's surface (tools, resources, prompts), and hosts
//! the client-side capability engines: the sampling tool loop, the
//! two-mode elicitation engine, and the advertised roots list.

pub mod client;
pub mod elicitation;
pub mod prelude;
pub mod roots;
pub mod sampling;

pub use client::{McpClient, McpClientBuilder};
pub use elicitation::{ElicitationEngine, ElicitationHandler};
pub use roots::RootsManager;
pub use sampling::{LlmHandler, SamplingEngine, ToolCaller, ToolLoopConfig};

use mcplex_protocol::McpError;
use mcplex_session::SessionError;

/// Errors surfaced by the client API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The session layer failed: transport closed, timeout, or a JSON-RPC
    /// error from the peer.
    #[error("{0}")]
    Session(#[from] SessionError),

    /// A protocol-level failure on our side: version mismatch, undecodable
    /// result, invalid roots.
    #[error("{0}")]
    Protocol(#[from] McpError),
}

impl ClientError {
    /// The JSON-RPC error code behind this failure, if any.
    pub fn code(&self) -> i64 {
        match self {
            ClientError::Session(e) => e.code(),
            ClientError::Protocol(e) => e.to_error_object().code,
        }
    }
}
