//! The MCP client: handshake, typed request wrappers, and the handlers for
//! server-initiated traffic (sampling, elicitation, roots).

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use mcplex_protocol::elicitation::ElicitCreateParams;
use mcplex_protocol::initialize::{
    ClientCapabilities, ElicitationCapability, Implementation, InitializeParams, InitializeResult,
    RootsCapability, SamplingCapability, ServerCapabilities,
};
use mcplex_protocol::meta::Cursor;
use mcplex_protocol::notifications::ElicitationCompleteParams;
use mcplex_protocol::prompts::{GetPromptResult, ListPromptsResult, Prompt};
use mcplex_protocol::resources::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceResult, Resource,
    ResourceTemplate,
};
use mcplex_protocol::roots::{ListRootsResult, Root};
use mcplex_protocol::sampling::CreateMessageParams;
use mcplex_protocol::tools::{CallToolResult, ListToolsResult, Tool};
use mcplex_protocol::{MCP_VERSION, McpError, McpResult, RequestId, methods};
use mcplex_protocol::content::ResourceContents;
use mcplex_session::{
    HandlerRegistry, NotificationHandler, RequestContext, RequestHandler, Session, SessionBuilder,
    SessionConfig,
};
use mcplex_transport::Transport;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::ClientError;
use crate::elicitation::{ElicitationEngine, ElicitationHandler};
use crate::roots::RootsManager;
use crate::sampling::{LlmHandler, SamplingEngine, ToolCaller, ToolLoopConfig};

fn parse_result<T: DeserializeOwned>(value: Value) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::Protocol(McpError::from(e)))
}

struct PingHandler;

#[async_trait]
impl RequestHandler for PingHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: RequestContext) -> McpResult<Value> {
        Ok(json!({}))
    }
}

struct RootsListHandler {
    roots: Arc<RootsManager>,
}

#[async_trait]
impl RequestHandler for RootsListHandler {
    async fn handle(&self, _params: Option<Value>, _ctx: RequestContext) -> McpResult<Value> {
        Ok(serde_json::to_value(ListRootsResult {
            roots: self.roots.roots(),
        })?)
    }
}

struct SamplingRequestHandler {
    engine: Arc<SamplingEngine>,
}

#[async_trait]
impl RequestHandler for SamplingRequestHandler {
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> McpResult<Value> {
        let params: CreateMessageParams =
            serde_json::from_value(params.unwrap_or_else(|| Value::Object(Default::default())))
                .map_err(|e| McpError::invalid_params(e.to_string()))?;
        let result = self.engine.run(params, ctx.cancellation_token()).await?;
        Ok(serde_json::to_value(result)?)
    }
}

struct ElicitationRequestHandler {
    engine: Arc<ElicitationEngine>,
}

#[async_trait]
impl RequestHandler for ElicitationRequestHandler {
    async fn handle(&self, params: Option<Value>, _ctx: RequestContext) -> McpResult<Value> {
        let params: ElicitCreateParams =
            serde_json::from_value(params.unwrap_or_else(|| Value::Object(Default::default())))
                .map_err(|e| McpError::invalid_params(e.to_string()))?;
        let result = self.engine.handle_create(params).await?;
        Ok(serde_json::to_value(result)?)
    }
}

struct ElicitationCompleteHandler {
    engine: Arc<ElicitationEngine>,
}

#[async_trait]
impl NotificationHandler for ElicitationCompleteHandler {
    async fn handle(&self, params: Option<Value>) {
        let parsed: Option<ElicitationCompleteParams> =
            params.and_then(|p| serde_json::from_value(p).ok());
        match parsed {
            Some(params) => self.engine.handle_complete(params),
            None => debug!("elicitation completion with undecodable params ignored"),
        }
    }
}

/// Routes the sampling loop's tool calls back to the server over this
/// client's own session. Holds a weak back-pointer to avoid a
/// session → handler → session cycle.
struct SessionToolCaller {
    session: Weak<Session>,
}

#[async_trait]
impl ToolCaller for SessionToolCaller {
    async fn call_tool(
        &self,
        name: &str,
        arguments: serde_json::Map<String, Value>,
    ) -> McpResult<CallToolResult> {
        let session = self
            .session
            .upgrade()
            .ok_or_else(|| McpError::internal("session is gone"))?;
        let value = session
            .request(
                methods::TOOLS_CALL,
                Some(json!({"name": name, "arguments": arguments})),
            )
            .await
            .map_err(|e| McpError::ToolExecutionError(e.to_string()))?;
        serde_json::from_value(value).map_err(|e| McpError::invalid_params(e.to_string()))
    }
}

/// Builds an [`McpClient`]: capability handlers first, then `connect`.
pub struct McpClientBuilder {
    info: Implementation,
    config: SessionConfig,
    llm: Option<Arc<dyn LlmHandler>>,
    tool_loop: ToolLoopConfig,
    elicitation: Option<Arc<dyn ElicitationHandler>>,
    roots: Vec<Root>,
    extra_notifications: Vec<(String, Arc<dyn NotificationHandler>)>,
}

impl McpClientBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: Implementation::new(name, version),
            config: SessionConfig::default(),
            llm: None,
            tool_loop: ToolLoopConfig::default(),
            elicitation: None,
            roots: Vec::new(),
            extra_notifications: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Enable sampling with the host's LLM.
    pub fn with_llm_handler(mut self, handler: Arc<dyn LlmHandler>) -> Self {
        self.llm = Some(handler);
        self
    }

    pub fn with_tool_loop_config(mut self, config: ToolLoopConfig) -> Self {
        self.tool_loop = config;
        self
    }

    /// Enable elicitation (both form and URL modes).
    pub fn with_elicitation_handler(mut self, handler: Arc<dyn ElicitationHandler>) -> Self {
        self.elicitation = Some(handler);
        self
    }

    /// Advertise roots from the start. Validated at connect.
    pub fn with_roots(mut self, roots: Vec<Root>) -> Self {
        self.roots = roots;
        self
    }

    /// Observe a server notification method (`tools/list_changed`,
    /// `resources/updated`, ...).
    pub fn on_notification(
        mut self,
        method: impl Into<String>,
        handler: Arc<dyn NotificationHandler>,
    ) -> Self {
        self.extra_notifications.push((method.into(), handler));
        self
    }

    /// Connect over a transport and run the initialize handshake.
    pub async fn connect(self, transport: Transport) -> Result<McpClient, ClientError> {
        let roots = Arc::new(RootsManager::new());
        roots
            .set_roots(self.roots)
            .map_err(ClientError::Protocol)?;

        let sampling = self
            .llm
            .map(|handler| Arc::new(SamplingEngine::new(handler, self.tool_loop.clone())));
        let elicitation = self
            .elicitation
            .map(|handler| Arc::new(ElicitationEngine::new(handler)));

        let mut handlers = HandlerRegistry::new();
        handlers.register_request(methods::PING, Arc::new(PingHandler));
        handlers.register_request(
            methods::ROOTS_LIST,
            Arc::new(RootsListHandler {
                roots: roots.clone(),
            }),
        );
        if let Some(engine) = &sampling {
            handlers.register_request(
                methods::SAMPLING_CREATE_MESSAGE,
                Arc::new(SamplingRequestHandler {
                    engine: engine.clone(),
                }),
            );
        }
        if let Some(engine) = &elicitation {
            handlers.register_request(
                methods::ELICITATION_CREATE,
                Arc::new(ElicitationRequestHandler {
                    engine: engine.clone(),
                }),
            );
            handlers.register_notification(
                methods::NOTIFICATION_ELICITATION_COMPLETE,
                Arc::new(ElicitationCompleteHandler {
                    engine: engine.clone(),
                }),
            );
        }
        for (method, handler) in self.extra_notifications {
            handlers.register_notification(method, handler);
        }

        let capabilities = ClientCapabilities {
            roots: Some(RootsCapability {
                list_changed: Some(true),
            }),
            sampling: sampling
                .as_ref()
                .map(|_| SamplingCapability { tools: Some(true) }),
            elicitation: elicitation.as_ref().map(|_| ElicitationCapability {
                form: Some(true),
                url: Some(true),
            }),
            experimental: None,
        };

        let session = SessionBuilder::new()
            .with_handlers(handlers)
            .with_config(self.config)
            .build(transport);

        let outbound = session.outbound();
        roots.set_notify_callback(move || {
            outbound.notify(methods::NOTIFICATION_ROOTS_LIST_CHANGED, None);
        });
        if let Some(engine) = &sampling {
            engine.set_tool_caller(Arc::new(SessionToolCaller {
                session: Arc::downgrade(&session),
            }));
        }

        info!(client = %self.info.name, "initializing MCP session");
        let params = InitializeParams {
            protocol_version: MCP_VERSION.to_string(),
            capabilities,
            client_info: self.info,
        };
        let value = session
            .request(
                methods::INITIALIZE,
                Some(serde_json::to_value(&params).map_err(McpError::from)?),
            )
            .await?;
        let init: InitializeResult = parse_result(value)?;
        if init.protocol_version != MCP_VERSION {
            return Err(ClientError::Protocol(McpError::VersionMismatch {
                expected: MCP_VERSION.to_string(),
                actual: init.protocol_version,
            }));
        }

        session.mark_initialized();
        session.notify(methods::NOTIFICATION_INITIALIZED, Some(json!({})));
        info!(server = %init.server_info.name, "MCP session initialized");

        Ok(McpClient {
            session,
            roots,
            sampling,
            elicitation,
            init,
        })
    }
}

/// A connected, initialized MCP client.
pub struct McpClient {
    session: Arc<Session>,
    roots: Arc<RootsManager>,
    sampling: Option<Arc<SamplingEngine>>,
    elicitation: Option<Arc<ElicitationEngine>>,
    init: InitializeResult,
}

impl McpClient {
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> McpClientBuilder {
        McpClientBuilder::new(name, version)
    }

    pub fn server_info(&self) -> &Implementation {
        &self.init.server_info
    }

    pub fn server_capabilities(&self) -> &ServerCapabilities {
        &self.init.capabilities
    }

    pub fn instructions(&self) -> Option<&str> {
        self.init.instructions.as_deref()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn roots(&self) -> &Arc<RootsManager> {
        &self.roots
    }

    pub fn sampling(&self) -> Option<&Arc<SamplingEngine>> {
        self.sampling.as_ref()
    }

    pub fn elicitation(&self) -> Option<&Arc<ElicitationEngine>> {
        self.elicitation.as_ref()
    }

    pub async fn ping(&self) -> Result<(), ClientError> {
        self.session.request(methods::PING, Some(json!({}))).await?;
        Ok(())
    }

    /// First page of tools.
    pub async fn list_tools(&self) -> Result<Vec<Tool>, ClientError> {
        Ok(self.list_tools_paginated(None).await?.tools)
    }

    pub async fn list_tools_paginated(
        &self,
        cursor: Option<Cursor>,
    ) -> Result<ListToolsResult, ClientError> {
        let value = self
            .session
            .request(methods::TOOLS_LIST, Some(cursor_params(cursor)))
            .await?;
        parse_result(value)
    }

    /// Every tool, folding pages until the cursor runs dry.
    pub async fn list_all_tools(&self) -> Result<Vec<Tool>, ClientError> {
        let mut tools = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.list_tools_paginated(cursor.take()).await?;
            tools.extend(page.tools);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(tools),
            }
        }
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<CallToolResult, ClientError> {
        let value = self
            .session
            .request(
                methods::TOOLS_CALL,
                Some(json!({"name": name, "arguments": arguments})),
            )
            .await?;
        parse_result(value)
    }

    pub async fn list_resources(&self) -> Result<Vec<Resource>, ClientError> {
        Ok(self.list_resources_paginated(None).await?.resources)
    }

    pub async fn list_resources_paginated(
        &self,
        cursor: Option<Cursor>,
    ) -> Result<ListResourcesResult, ClientError> {
        let value = self
            .session
            .request(methods::RESOURCES_LIST, Some(cursor_params(cursor)))
            .await?;
        parse_result(value)
    }

    pub async fn list_resource_templates(&self) -> Result<Vec<ResourceTemplate>, ClientError> {
        let value = self
            .session
            .request(methods::RESOURCES_TEMPLATES_LIST, Some(json!({})))
            .await?;
        let result: ListResourceTemplatesResult = parse_result(value)?;
        Ok(result.resource_templates)
    }

    pub async fn read_resource(&self, uri: &str) -> Result<Vec<ResourceContents>, ClientError> {
        let value = self
            .session
            .request(methods::RESOURCES_READ, Some(json!({"uri": uri})))
            .await?;
        let result: ReadResourceResult = parse_result(value)?;
        Ok(result.contents)
    }

    pub async fn subscribe_resource(&self, uri: &str) -> Result<(), ClientError> {
        self.session
            .request(methods::RESOURCES_SUBSCRIBE, Some(json!({"uri": uri})))
            .await?;
        Ok(())
    }

    pub async fn unsubscribe_resource(&self, uri: &str) -> Result<(), ClientError> {
        self.session
            .request(methods::RESOURCES_UNSUBSCRIBE, Some(json!({"uri": uri})))
            .await?;
        Ok(())
    }

    pub async fn list_prompts(&self) -> Result<Vec<Prompt>, ClientError> {
        let value = self
            .session
            .request(methods::PROMPTS_LIST, Some(json!({})))
            .await?;
        let result: ListPromptsResult = parse_result(value)?;
        Ok(result.prompts)
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Value,
    ) -> Result<GetPromptResult, ClientError> {
        let value = self
            .session
            .request(
                methods::PROMPTS_GET,
                Some(json!({"name": name, "arguments": arguments})),
            )
            .await?;
        parse_result(value)
    }

    /// Replace the advertised roots and tell the server.
    pub fn set_roots(&self, roots: Vec<Root>) -> Result<(), ClientError> {
        self.roots.set_roots(roots).map_err(ClientError::Protocol)?;
        self.roots.notify_changed();
        Ok(())
    }

    /// Cancel an in-flight request by id (obtained from
    /// `session().start_request`).
    pub fn cancel(&self, id: &RequestId, reason: Option<&str>) {
        self.session.cancel_request(id, reason);
    }

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    pub async fn closed(&self) {
        self.session.closed().await;
    }
}

fn cursor_params(cursor: Option<Cursor>) -> Value {
    match cursor {
        Some(cursor) => json!({"cursor": cursor}),
        None => json!({}),
    }
}
