//! Request handlers binding the registries onto a session's dispatcher.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use mcplex_protocol::initialize::{
    ClientCapabilities, Implementation, InitializeParams, InitializeResult, ServerCapabilities,
};
use mcplex_protocol::prompts::{GetPromptParams, ListPromptsParams, ListPromptsResult};
use mcplex_protocol::resources::{
    ListResourceTemplatesResult, ListResourcesParams, ListResourcesResult, ReadResourceParams,
    ReadResourceResult, SubscribeParams,
};
use mcplex_protocol::tools::{CallToolParams, ListToolsParams, ListToolsResult};
use mcplex_protocol::{MCP_VERSION, McpError, McpResult};
use mcplex_session::{InitializeGate, NotificationHandler, RequestContext, RequestHandler};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::prompt::PromptRegistry;
use crate::resource::ResourceRegistry;
use crate::tool::ToolRegistry;

fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> McpResult<T> {
    let value = params.unwrap_or_else(|| Value::Object(Default::default()));
    serde_json::from_value(value).map_err(|e| McpError::invalid_params(e.to_string()))
}

fn to_result<T: serde::Serialize>(result: &T) -> McpResult<Value> {
    Ok(serde_json::to_value(result)?)
}

pub(crate) struct InitializeHandler {
    pub info: Implementation,
    pub capabilities: ServerCapabilities,
    pub instructions: Option<String>,
    pub gate: Arc<InitializeGate>,
    pub session_id: String,
    pub peer_capabilities: Arc<RwLock<HashMap<String, ClientCapabilities>>>,
}

#[async_trait]
impl RequestHandler for InitializeHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> McpResult<Value> {
        let params: InitializeParams = parse_params(params)?;
        if params.protocol_version != MCP_VERSION {
            // Reply with the version we speak; the client decides whether
            // to continue.
            warn!(
                client_version = %params.protocol_version,
                server_version = MCP_VERSION,
                "protocol version mismatch"
            );
        }
        debug!(
            session_id = %self.session_id,
            client = %params.client_info.name,
            "initialize handshake"
        );
        if let Ok(mut peers) = self.peer_capabilities.write() {
            peers.insert(self.session_id.clone(), params.capabilities);
        }
        self.gate.mark_ready();
        to_result(&InitializeResult {
            protocol_version: MCP_VERSION.to_string(),
            capabilities: self.capabilities.clone(),
            server_info: self.info.clone(),
            instructions: self.instructions.clone(),
        })
    }
}

pub(crate) struct PingHandler;

#[async_trait]
impl RequestHandler for PingHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: RequestContext) -> McpResult<Value> {
        Ok(json!({}))
    }
}

pub(crate) struct ListToolsHandler {
    pub tools: Arc<ToolRegistry>,
}

#[async_trait]
impl RequestHandler for ListToolsHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> McpResult<Value> {
        let params: ListToolsParams = parse_params(params)?;
        let page = self.tools.list_paginated(params.cursor.as_ref(), None)?;
        to_result(&ListToolsResult {
            tools: page.items,
            next_cursor: page.next_cursor,
            total: page.total,
        })
    }
}

pub(crate) struct CallToolHandler {
    pub tools: Arc<ToolRegistry>,
}

#[async_trait]
impl RequestHandler for CallToolHandler {
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> McpResult<Value> {
        let params: CallToolParams = parse_params(params)?;
        let result = self.tools.call(&params.name, params.arguments, ctx).await?;
        to_result(&result)
    }
}

pub(crate) struct ListResourcesHandler {
    pub resources: Arc<ResourceRegistry>,
}

#[async_trait]
impl RequestHandler for ListResourcesHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> McpResult<Value> {
        let params: ListResourcesParams = parse_params(params)?;
        let page = self.resources.list_paginated(params.cursor.as_ref(), None)?;
        to_result(&ListResourcesResult {
            resources: page.items,
            next_cursor: page.next_cursor,
            total: page.total,
        })
    }
}

pub(crate) struct ListResourceTemplatesHandler {
    pub resources: Arc<ResourceRegistry>,
}

#[async_trait]
impl RequestHandler for ListResourceTemplatesHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> McpResult<Value> {
        let params: ListResourcesParams = parse_params(params)?;
        let page = self
            .resources
            .list_templates_paginated(params.cursor.as_ref(), None)?;
        to_result(&ListResourceTemplatesResult {
            resource_templates: page.items,
            next_cursor: page.next_cursor,
            total: page.total,
        })
    }
}

pub(crate) struct ReadResourceHandler {
    pub resources: Arc<ResourceRegistry>,
}

#[async_trait]
impl RequestHandler for ReadResourceHandler {
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> McpResult<Value> {
        let params: ReadResourceParams = parse_params(params)?;
        let contents = self.resources.read(&params.uri, ctx).await?;
        to_result(&ReadResourceResult { contents })
    }
}

pub(crate) struct SubscribeHandler {
    pub resources: Arc<ResourceRegistry>,
    pub session_id: String,
}

#[async_trait]
impl RequestHandler for SubscribeHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> McpResult<Value> {
        let params: SubscribeParams = parse_params(params)?;
        self.resources.subscribe(&params.uri, &self.session_id);
        Ok(json!({}))
    }
}

pub(crate) struct UnsubscribeHandler {
    pub resources: Arc<ResourceRegistry>,
    pub session_id: String,
}

#[async_trait]
impl RequestHandler for UnsubscribeHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> McpResult<Value> {
        let params: SubscribeParams = parse_params(params)?;
        self.resources.unsubscribe(&params.uri, &self.session_id);
        Ok(json!({}))
    }
}

pub(crate) struct ListPromptsHandler {
    pub prompts: Arc<PromptRegistry>,
}

#[async_trait]
impl RequestHandler for ListPromptsHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> McpResult<Value> {
        let params: ListPromptsParams = parse_params(params)?;
        let page = self.prompts.list_paginated(params.cursor.as_ref(), None)?;
        to_result(&ListPromptsResult {
            prompts: page.items,
            next_cursor: page.next_cursor,
            total: page.total,
        })
    }
}

pub(crate) struct GetPromptHandler {
    pub prompts: Arc<PromptRegistry>,
}

#[async_trait]
impl RequestHandler for GetPromptHandler {
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> McpResult<Value> {
        let params: GetPromptParams = parse_params(params)?;
        let result = self
            .prompts
            .get(&params.name, params.arguments, ctx)
            .await?;
        to_result(&result)
    }
}

pub(crate) struct InitializedNotificationHandler {
    pub session_id: String,
}

#[async_trait]
impl NotificationHandler for InitializedNotificationHandler {
    async fn handle(&self, _params: Option<Value>) {
        debug!(session_id = %self.session_id, "client reported initialized");
    }
}
