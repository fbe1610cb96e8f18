//! # mcplex-server: the server half of an MCP peer
//!
//! Registries for tools, resources (exact URIs, URI templates, and
//! subscriptions), and prompts, plus [`McpServer`], which binds them onto
//! any number of sessions. Listings paginate in registration order behind
//! opaque cursors; registry changes fan `list_changed` notifications out to
//! every connected session.

pub mod handlers;
pub mod pagination;
pub mod prelude;
pub mod prompt;
pub mod resource;
pub mod server;
pub mod tool;
pub mod uri_template;

pub use pagination::{DEFAULT_PAGE_SIZE, Page, list_all, paginate};
pub use prompt::{PromptHandler, PromptRegistry};
pub use resource::{ResourceHandler, ResourceRegistry};
pub use server::{McpServer, McpServerBuilder};
pub use tool::{ToolHandler, ToolRegistry};
pub use uri_template::UriTemplate;
