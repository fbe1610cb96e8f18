//! Root types: `file://` URIs a client advertises as permitted scope.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::McpError;

/// A single advertised root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Root {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Root {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Roots must be well-formed `file://` URIs; anything else is rejected
    /// at insertion time.
    pub fn validate(&self) -> Result<(), McpError> {
        if !self.uri.starts_with("file://") {
            return Err(McpError::ValidationError(format!(
                "root URI must begin with file://, got '{}'",
                self.uri
            )));
        }
        Url::parse(&self.uri).map_err(|e| {
            McpError::ValidationError(format!("root URI '{}' is not a valid URL: {e}", self.uri))
        })?;
        Ok(())
    }
}

/// Result of `roots/list`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListRootsResult {
    pub roots: Vec<Root>,
}
