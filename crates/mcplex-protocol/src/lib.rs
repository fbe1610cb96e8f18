//! # mcplex-protocol: MCP 2025-11-25 wire types
//!
//! Protocol types and the JSON-RPC 2.0 codec shared by every other mcplex
//! crate. Nothing here does I/O: the codec maps bytes that have already been
//! framed by a transport into classified messages and back, and the rest of
//! the crate is the MCP data model (content blocks, tools, resources,
//! prompts, sampling, elicitation, roots, capabilities).
//!
//! Handlers throughout the stack return [`McpError`]; the dispatch layer owns
//! the conversion to JSON-RPC error objects via [`McpError::to_error_object`],
//! so domain code never hand-writes protocol error codes.

pub mod content;
pub mod elicitation;
pub mod initialize;
pub mod json_rpc;
pub mod meta;
pub mod notifications;
pub mod ping;
pub mod prelude;
pub mod prompts;
pub mod resources;
pub mod roots;
pub mod sampling;
pub mod schema;
pub mod tools;

pub use content::{ContentBlock, ResourceContents, ResourceReference};
pub use json_rpc::{
    JSONRPC_VERSION, JsonRpcErrorObject, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
    JsonRpcResponse, JsonRpcVersion, ParseFailure, RequestId, ResponsePayload, error_codes,
    extract_raw_id, parse_message,
};
pub use meta::{Cursor, ProgressToken};
pub use schema::JsonSchema;

/// The MCP protocol version implemented by this crate
pub const MCP_VERSION: &str = "2025-11-25";

/// MCP method names.
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const PING: &str = "ping";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
    pub const RESOURCES_LIST: &str = "resources/list";
    pub const RESOURCES_TEMPLATES_LIST: &str = "resources/templates/list";
    pub const RESOURCES_READ: &str = "resources/read";
    pub const RESOURCES_SUBSCRIBE: &str = "resources/subscribe";
    pub const RESOURCES_UNSUBSCRIBE: &str = "resources/unsubscribe";
    pub const PROMPTS_LIST: &str = "prompts/list";
    pub const PROMPTS_GET: &str = "prompts/get";
    pub const SAMPLING_CREATE_MESSAGE: &str = "sampling/createMessage";
    pub const ELICITATION_CREATE: &str = "elicitation/create";
    pub const ROOTS_LIST: &str = "roots/list";

    pub const NOTIFICATION_CANCELLED: &str = "notifications/cancelled";
    pub const NOTIFICATION_INITIALIZED: &str = "notifications/initialized";
    pub const NOTIFICATION_PROGRESS: &str = "notifications/progress";
    pub const NOTIFICATION_ROOTS_LIST_CHANGED: &str = "notifications/roots/list_changed";
    pub const NOTIFICATION_RESOURCES_LIST_CHANGED: &str = "notifications/resources/list_changed";
    pub const NOTIFICATION_RESOURCES_UPDATED: &str = "notifications/resources/updated";
    pub const NOTIFICATION_TOOLS_LIST_CHANGED: &str = "notifications/tools/list_changed";
    pub const NOTIFICATION_PROMPTS_LIST_CHANGED: &str = "notifications/prompts/list_changed";
    pub const NOTIFICATION_ELICITATION_COMPLETE: &str = "notifications/elicitation/complete";
}

/// Common result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// MCP domain errors.
///
/// Handlers return these; the dispatcher converts them into JSON-RPC error
/// objects at the protocol boundary.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Duplicate registration: {0}")]
    DuplicateRegistration(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionError(String),

    #[error("Resource execution failed: {0}")]
    ResourceExecutionError(String),

    #[error("Prompt execution failed: {0}")]
    PromptExecutionError(String),

    #[error("Sampling failed: {0}")]
    SamplingError(String),

    #[error("Elicitation failed: {0}")]
    ElicitationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl McpError {
    pub fn missing_param(param: &str) -> Self {
        Self::MissingParameter(param.to_string())
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Convert to a JSON-RPC error object.
    ///
    /// Unknown names/URIs and every parameter or validation failure map to
    /// invalid-params; execution failures map to internal-error. Tool-internal
    /// failures never reach this path; they travel as
    /// `CallToolResult { isError: true }`.
    pub fn to_error_object(&self) -> JsonRpcErrorObject {
        match self {
            McpError::ToolNotFound(_)
            | McpError::ResourceNotFound(_)
            | McpError::PromptNotFound(_)
            | McpError::InvalidParameters(_)
            | McpError::MissingParameter(_)
            | McpError::DuplicateRegistration(_)
            | McpError::ValidationError(_)
            | McpError::VersionMismatch { .. } => {
                JsonRpcErrorObject::invalid_params(&self.to_string())
            }
            McpError::InvalidRequest(_) => {
                JsonRpcErrorObject::invalid_request(Some(self.to_string()))
            }
            McpError::ToolExecutionError(_)
            | McpError::ResourceExecutionError(_)
            | McpError::PromptExecutionError(_)
            | McpError::SamplingError(_)
            | McpError::ElicitationError(_)
            | McpError::Internal(_)
            | McpError::SerializationError(_) => {
                JsonRpcErrorObject::internal_error(Some(self.to_string()))
            }
        }
    }
}
