//! Content block types shared by tool results, prompts, and sampling.
//!
//! `ContentBlock` is the closed union the wire discriminates on the `type`
//! string; serde's tag attribute keeps the match exhaustive in both
//! directions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Text resource contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextResourceContents {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub text: String,
}

/// Binary resource contents, base64-encoded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobResourceContents {
    pub uri: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    pub blob: String,
}

/// Resource contents union, discriminated by which payload field is present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContents {
    Text(TextResourceContents),
    Blob(BlobResourceContents),
}

impl ResourceContents {
    pub fn text(uri: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Text(TextResourceContents {
            uri: uri.into(),
            mime_type: None,
            text: text.into(),
        })
    }

    pub fn text_with_mime(
        uri: impl Into<String>,
        text: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self::Text(TextResourceContents {
            uri: uri.into(),
            mime_type: Some(mime_type.into()),
            text: text.into(),
        })
    }

    pub fn blob(
        uri: impl Into<String>,
        blob: impl Into<String>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self::Blob(BlobResourceContents {
            uri: uri.into(),
            mime_type: Some(mime_type.into()),
            blob: blob.into(),
        })
    }

    pub fn uri(&self) -> &str {
        match self {
            ResourceContents::Text(t) => &t.uri,
            ResourceContents::Blob(b) => &b.uri,
        }
    }
}

/// Reference to a resource, used by resource-link content blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceReference {
    pub uri: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl ResourceReference {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            description: None,
            mime_type: None,
        }
    }
}

/// Content block union discriminated on the `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    /// Text content
    #[serde(rename = "text")]
    Text { text: String },
    /// Image content, base64-encoded
    #[serde(rename = "image")]
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Audio content, base64-encoded
    #[serde(rename = "audio")]
    Audio {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    /// Link to a resource the receiver may read later
    #[serde(rename = "resource_link")]
    ResourceLink {
        #[serde(flatten)]
        resource: ResourceReference,
    },
    /// Resource contents embedded inline
    #[serde(rename = "resource")]
    EmbeddedResource { resource: ResourceContents },
    /// A model-issued tool invocation
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        arguments: Map<String, Value>,
    },
    /// The outcome of a tool invocation, correlated by `toolUseId`
    #[serde(rename = "tool_result")]
    ToolResult {
        #[serde(rename = "toolUseId")]
        tool_use_id: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<ContentBlock>,
        #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Image {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn audio(data: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self::Audio {
            data: data.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn resource_link(resource: ResourceReference) -> Self {
        Self::ResourceLink { resource }
    }

    pub fn embedded_resource(resource: ResourceContents) -> Self {
        Self::EmbeddedResource { resource }
    }

    pub fn tool_use(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: Map<String, Value>,
    ) -> Self {
        Self::ToolUse {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: Vec<ContentBlock>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content,
            is_error: None,
        }
    }

    pub fn tool_result_error(tool_use_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: vec![ContentBlock::text(message)],
            is_error: Some(true),
        }
    }

    pub fn is_tool_use(&self) -> bool {
        matches!(self, ContentBlock::ToolUse { .. })
    }

    /// The text payload, if this is a text block.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_block_wire_shape() {
        let block = ContentBlock::text("hello");
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json, json!({"type": "text", "text": "hello"}));
    }

    #[test]
    fn test_tool_use_round_trip() {
        let mut args = Map::new();
        args.insert("query".to_string(), json!("rust"));
        let block = ContentBlock::tool_use("tu-1", "search", args);

        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_use");
        assert_eq!(json["name"], "search");

        let parsed: ContentBlock = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, block);
    }

    #[test]
    fn test_tool_result_error_shape() {
        let block = ContentBlock::tool_result_error("tu-2", "boom");
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "tool_result");
        assert_eq!(json["toolUseId"], "tu-2");
        assert_eq!(json["isError"], true);
        assert_eq!(json["content"][0]["text"], "boom");
    }

    #[test]
    fn test_embedded_resource_round_trip() {
        let block = ContentBlock::embedded_resource(ResourceContents::text_with_mime(
            "file:///a.txt",
            "contents",
            "text/plain",
        ));
        let wire = serde_json::to_string(&block).unwrap();
        let parsed: ContentBlock = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed, block);
    }

    #[test]
    fn test_resource_link_flattens_reference() {
        let block = ContentBlock::resource_link(ResourceReference::new("file:///b", "b"));
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "resource_link");
        assert_eq!(json["uri"], "file:///b");
        assert_eq!(json["name"], "b");
    }

    #[test]
    fn test_unknown_type_tag_rejected() {
        let result: Result<ContentBlock, _> =
            serde_json::from_value(json!({"type": "video", "data": "x"}));
        assert!(result.is_err());
    }
}
