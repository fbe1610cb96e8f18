//! Convenience re-exports.

pub use crate::pagination::{Page, list_all, paginate};
pub use crate::prompt::{PromptHandler, PromptRegistry};
pub use crate::resource::{ResourceHandler, ResourceRegistry};
pub use crate::server::{McpServer, McpServerBuilder};
pub use crate::tool::{ToolHandler, ToolRegistry};
pub use mcplex_protocol::prelude::*;
pub use mcplex_session::RequestContext;
