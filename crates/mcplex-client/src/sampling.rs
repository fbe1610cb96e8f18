//! The sampling tool loop.
//!
//! A server's `sampling/createMessage` lands here. Without tools (or
//! without a configured tool caller) the LLM handler runs once and its
//! result goes straight back. With tools, the engine drives the agentic
//! cycle of LLM turn, tool calls back to the requesting server, and results
//! appended, under an iteration bound and one aggregate wall-clock bound,
//! checking the cooperative cancel token around every LLM call.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mcplex_protocol::content::ContentBlock;
use mcplex_protocol::sampling::{
    CreateMessageParams, CreateMessageResult, MessageContent, Role, SamplingMessage,
};
use mcplex_protocol::tools::CallToolResult;
use mcplex_protocol::{McpError, McpResult};
use mcplex_session::CancellationToken;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// The host's LLM. One call per loop turn.
#[async_trait]
pub trait LlmHandler: Send + Sync {
    async fn create_message(&self, params: CreateMessageParams) -> McpResult<CreateMessageResult>;
}

/// Dispatches a model-issued tool call, normally back to the server that
/// requested the sampling.
#[async_trait]
pub trait ToolCaller: Send + Sync {
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> McpResult<CallToolResult>;
}

/// Bounds for one tool-loop run.
#[derive(Debug, Clone)]
pub struct ToolLoopConfig {
    /// Maximum LLM calls per run.
    pub max_iterations: usize,
    /// Aggregate wall-clock bound across all iterations.
    pub timeout: Duration,
}

impl Default for ToolLoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Runs `sampling/createMessage` requests against the host's LLM handler.
pub struct SamplingEngine {
    handler: Arc<dyn LlmHandler>,
    // Late-bound: the caller needs the session, which needs the engine's
    // handler registered first.
    tool_caller: Mutex<Option<Arc<dyn ToolCaller>>>,
    config: ToolLoopConfig,
}

impl SamplingEngine {
    pub fn new(handler: Arc<dyn LlmHandler>, config: ToolLoopConfig) -> Self {
        Self {
            handler,
            tool_caller: Mutex::new(None),
            config,
        }
    }

    pub fn set_tool_caller(&self, caller: Arc<dyn ToolCaller>) {
        *self
            .tool_caller
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = Some(caller);
    }

    pub fn config(&self) -> &ToolLoopConfig {
        &self.config
    }

    /// Execute one createMessage request to completion.
    pub async fn run(
        &self,
        params: CreateMessageParams,
        token: &CancellationToken,
    ) -> McpResult<CreateMessageResult> {
        params.validate()?;

        let caller = self
            .tool_caller
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        let (Some(caller), true) = (caller, params.has_tools()) else {
            return self.handler.create_message(params).await;
        };

        let started = Instant::now();
        let mut params = params;
        let mut llm_calls = 0usize;

        loop {
            if token.is_cancelled() {
                return Err(McpError::SamplingError(
                    "sampling cancelled by requester".to_string(),
                ));
            }
            if llm_calls >= self.config.max_iterations {
                return Err(McpError::internal(format!(
                    "tool loop stopped after {} iterations without a final answer",
                    self.config.max_iterations
                )));
            }
            if started.elapsed() >= self.config.timeout {
                return Err(McpError::internal(format!(
                    "tool loop exceeded its {:?} wall-clock bound",
                    self.config.timeout
                )));
            }

            let result = self.handler.create_message(params.clone()).await?;
            llm_calls += 1;

            if token.is_cancelled() {
                return Err(McpError::SamplingError(
                    "sampling cancelled by requester".to_string(),
                ));
            }

            if !result.wants_tool_use() {
                return Ok(result);
            }

            let tool_uses: Vec<(String, String, Map<String, Value>)> = result
                .content
                .blocks()
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse {
                        id,
                        name,
                        arguments,
                    } => Some((id.clone(), name.clone(), arguments.clone())),
                    _ => None,
                })
                .collect();

            // A toolUse stop reason with nothing to invoke: hand the result
            // back unchanged.
            if tool_uses.is_empty() {
                warn!("toolUse stop reason without tool_use content");
                return Ok(result);
            }

            let mut tool_results = Vec::with_capacity(tool_uses.len());
            for (tool_use_id, name, arguments) in tool_uses {
                debug!(tool = %name, tool_use_id = %tool_use_id, "tool loop invoking tool");
                let block = match caller.call_tool(&name, arguments).await {
                    Ok(outcome) => tool_result_block(tool_use_id, outcome),
                    // Surfaced to the model, which may recover.
                    Err(e) => ContentBlock::tool_result_error(tool_use_id, e.to_string()),
                };
                tool_results.push(block);
            }

            params.messages.push(SamplingMessage::new(
                Role::Assistant,
                result.content.clone(),
            ));
            params.messages.push(SamplingMessage::new(
                Role::User,
                MessageContent::Multiple(tool_results),
            ));
        }
    }
}

/// Fold a tool outcome into a `tool_result` block: text items collapse into
/// one newline-joined string, other blocks pass through, and the server's
/// `isError` flag is propagated.
fn tool_result_block(tool_use_id: String, outcome: CallToolResult) -> ContentBlock {
    let mut texts: Vec<String> = Vec::new();
    let mut others: Vec<ContentBlock> = Vec::new();
    for block in outcome.content {
        match block {
            ContentBlock::Text { text } => texts.push(text),
            other => others.push(other),
        }
    }
    let mut content = Vec::new();
    if !texts.is_empty() {
        content.push(ContentBlock::text(texts.join("\n")));
    }
    content.extend(others);

    ContentBlock::ToolResult {
        tool_use_id,
        content,
        is_error: outcome.is_error,
    }
}
