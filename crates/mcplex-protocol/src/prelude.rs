//! Convenience re-exports for downstream crates.

pub use crate::content::{ContentBlock, ResourceContents, ResourceReference};
pub use crate::elicitation::{ElicitAction, ElicitCreateParams, ElicitResult, PrimitiveSchema};
pub use crate::initialize::{
    ClientCapabilities, Implementation, InitializeParams, InitializeResult, ServerCapabilities,
};
pub use crate::json_rpc::{
    JsonRpcErrorObject, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    RequestId,
};
pub use crate::meta::{Cursor, ProgressToken};
pub use crate::prompts::{GetPromptResult, Prompt, PromptArgument, PromptMessage};
pub use crate::resources::{ReadResourceResult, Resource, ResourceTemplate};
pub use crate::roots::Root;
pub use crate::sampling::{
    CreateMessageParams, CreateMessageResult, Role, SamplingMessage, StopReason,
};
pub use crate::schema::JsonSchema;
pub use crate::tools::{CallToolParams, CallToolResult, Tool};
pub use crate::{MCP_VERSION, McpError, McpResult, methods};
