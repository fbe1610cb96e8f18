//! Convenience re-exports.

pub use crate::client::{McpClient, McpClientBuilder};
pub use crate::elicitation::{ElicitationEngine, ElicitationHandler};
pub use crate::roots::RootsManager;
pub use crate::sampling::{LlmHandler, SamplingEngine, ToolCaller, ToolLoopConfig};
pub use crate::ClientError;
pub use mcplex_protocol::prelude::*;
