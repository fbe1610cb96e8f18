//! Sampling types for `sampling/createMessage`, including the tool-calling
//! extensions (tools, tool choice, tool-use stop reason).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::McpError;
use crate::content::ContentBlock;
use crate::tools::Tool;

/// Message role. Only "user" and "assistant" exist on this wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Model hint: an open-ended name the client maps onto its own models.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelHint {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ModelHint {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
        }
    }
}

/// Model preferences
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPreferences {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hints: Option<Vec<ModelHint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_priority: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_priority: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intelligence_priority: Option<f64>,
}

/// Which other-server context the client may fold into the LLM call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IncludeContext {
    None,
    ThisServer,
    AllServers,
}

/// Why generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    EndTurn,
    StopSequence,
    MaxTokens,
    ToolUse,
}

/// Tool choice mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoiceMode {
    /// Model decides whether to use tools
    Auto,
    /// Model must not use any tools
    None,
    /// Model must use at least one tool
    Required,
}

/// Tool choice configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolChoice {
    pub mode: ToolChoiceMode,
    /// Specific tool to use; only meaningful with mode "required"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ToolChoice {
    pub fn auto() -> Self {
        Self {
            mode: ToolChoiceMode::Auto,
            name: None,
        }
    }

    pub fn none() -> Self {
        Self {
            mode: ToolChoiceMode::None,
            name: None,
        }
    }

    pub fn required() -> Self {
        Self {
            mode: ToolChoiceMode::Required,
            name: None,
        }
    }

    pub fn specific(name: impl Into<String>) -> Self {
        Self {
            mode: ToolChoiceMode::Required,
            name: Some(name.into()),
        }
    }
}

/// Message content: a single block or a list of blocks.
///
/// Both forms are legal on the wire; `blocks()` gives callers one view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Single(ContentBlock),
    Multiple(Vec<ContentBlock>),
}

impl MessageContent {
    pub fn blocks(&self) -> &[ContentBlock] {
        match self {
            MessageContent::Single(block) => std::slice::from_ref(block),
            MessageContent::Multiple(blocks) => blocks,
        }
    }

    pub fn has_tool_use(&self) -> bool {
        self.blocks().iter().any(ContentBlock::is_tool_use)
    }
}

impl From<ContentBlock> for MessageContent {
    fn from(block: ContentBlock) -> Self {
        MessageContent::Single(block)
    }
}

impl From<Vec<ContentBlock>> for MessageContent {
    fn from(blocks: Vec<ContentBlock>) -> Self {
        MessageContent::Multiple(blocks)
    }
}

/// One conversation message in a sampling request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl SamplingMessage {
    pub fn new(role: Role, content: impl Into<MessageContent>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::new(Role::User, ContentBlock::text(text))
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, ContentBlock::text(text))
    }
}

/// Parameters for `sampling/createMessage`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageParams {
    pub messages: Vec<SamplingMessage>,
    /// Maximum tokens to generate; must be at least 1
    pub max_tokens: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_context: Option<IncludeContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_preferences: Option<ModelPreferences>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl CreateMessageParams {
    pub fn new(messages: Vec<SamplingMessage>, max_tokens: i64) -> Self {
        Self {
            messages,
            max_tokens,
            temperature: None,
            stop_sequences: None,
            system_prompt: None,
            include_context: None,
            model_preferences: None,
            tools: None,
            tool_choice: None,
            metadata: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_tool_choice(mut self, tool_choice: ToolChoice) -> Self {
        self.tool_choice = Some(tool_choice);
        self
    }

    pub fn with_model_preferences(mut self, preferences: ModelPreferences) -> Self {
        self.model_preferences = Some(preferences);
        self
    }

    /// Structural checks beyond what serde enforces.
    pub fn validate(&self) -> Result<(), McpError> {
        if self.max_tokens < 1 {
            return Err(McpError::InvalidParameters(format!(
                "maxTokens must be at least 1, got {}",
                self.max_tokens
            )));
        }
        if self.messages.is_empty() {
            return Err(McpError::InvalidParameters(
                "messages must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn has_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|tools| !tools.is_empty())
    }
}

/// Result of `sampling/createMessage`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMessageResult {
    pub role: Role,
    pub content: MessageContent,
    /// Model the client actually used
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

impl CreateMessageResult {
    pub fn assistant_text(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: ContentBlock::text(text).into(),
            model: model.into(),
            stop_reason: Some(StopReason::EndTurn),
        }
    }

    pub fn with_stop_reason(mut self, reason: StopReason) -> Self {
        self.stop_reason = Some(reason);
        self
    }

    /// True when the result asks for tool invocations: either via the stop
    /// reason or by carrying tool-use content.
    pub fn wants_tool_use(&self) -> bool {
        self.stop_reason == Some(StopReason::ToolUse) || self.content.has_tool_use()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stop_reason_wire_values() {
        assert_eq!(
            serde_json::to_value(StopReason::EndTurn).unwrap(),
            json!("endTurn")
        );
        assert_eq!(
            serde_json::to_value(StopReason::ToolUse).unwrap(),
            json!("toolUse")
        );
    }

    #[test]
    fn test_include_context_wire_values() {
        assert_eq!(
            serde_json::to_value(IncludeContext::ThisServer).unwrap(),
            json!("thisServer")
        );
        assert_eq!(
            serde_json::to_value(IncludeContext::None).unwrap(),
            json!("none")
        );
    }

    #[test]
    fn test_single_and_list_content_both_parse() {
        let single: SamplingMessage = serde_json::from_value(json!({
            "role": "user",
            "content": {"type": "text", "text": "hi"}
        }))
        .unwrap();
        assert_eq!(single.content.blocks().len(), 1);

        let multiple: SamplingMessage = serde_json::from_value(json!({
            "role": "assistant",
            "content": [
                {"type": "text", "text": "a"},
                {"type": "text", "text": "b"}
            ]
        }))
        .unwrap();
        assert_eq!(multiple.content.blocks().len(), 2);
    }

    #[test]
    fn test_max_tokens_validation() {
        let params = CreateMessageParams::new(vec![SamplingMessage::user_text("x")], 0);
        assert!(params.validate().is_err());
        let params = CreateMessageParams::new(vec![SamplingMessage::user_text("x")], 1);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_wants_tool_use_via_content() {
        let result = CreateMessageResult {
            role: Role::Assistant,
            content: ContentBlock::tool_use("tu-1", "search", Default::default()).into(),
            model: "test-model".to_string(),
            stop_reason: None,
        };
        assert!(result.wants_tool_use());
    }

    #[test]
    fn test_wants_tool_use_via_stop_reason() {
        let result = CreateMessageResult::assistant_text("m", "done")
            .with_stop_reason(StopReason::ToolUse);
        assert!(result.wants_tool_use());
    }

    #[test]
    fn test_tool_choice_specific() {
        let choice = ToolChoice::specific("calculate");
        let json = serde_json::to_value(&choice).unwrap();
        assert_eq!(json["mode"], "required");
        assert_eq!(json["name"], "calculate");
    }
}
