//! The MCP server: registries plus per-transport session wiring.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use mcplex_protocol::initialize::{
    ClientCapabilities, Implementation, PromptsCapability, ResourcesCapability, ServerCapabilities,
    ToolsCapability,
};
use mcplex_protocol::notifications::ResourceUpdatedParams;
use mcplex_protocol::methods;
use mcplex_session::{
    HandlerRegistry, InitializeGate, Outbound, Session, SessionBuilder, SessionConfig,
};
use mcplex_transport::Transport;
use tracing::{debug, info};

use crate::handlers::{
    CallToolHandler, GetPromptHandler, InitializeHandler, InitializedNotificationHandler,
    ListPromptsHandler, ListResourceTemplatesHandler, ListResourcesHandler, ListToolsHandler,
    PingHandler, ReadResourceHandler, SubscribeHandler, UnsubscribeHandler,
};
use crate::prompt::PromptRegistry;
use crate::resource::ResourceRegistry;
use crate::tool::ToolRegistry;

type SessionMap = Arc<RwLock<HashMap<String, Outbound>>>;

struct ServerInner {
    info: Implementation,
    instructions: Option<String>,
    config: SessionConfig,
    tools: Arc<ToolRegistry>,
    resources: Arc<ResourceRegistry>,
    prompts: Arc<PromptRegistry>,
    peer_capabilities: Arc<RwLock<HashMap<String, ClientCapabilities>>>,
    sessions: SessionMap,
    session_counter: AtomicU64,
}

/// An MCP server: three registries and the machinery to serve them over any
/// number of transports.
///
/// Registries are live: registering or removing a tool/resource/prompt
/// after sessions are up fans the matching `list_changed` notification out
/// to every connected session, and `resources().notify_updated(uri)`
/// reaches that URI's subscribers.
#[derive(Clone)]
pub struct McpServer {
    inner: Arc<ServerInner>,
}

impl McpServer {
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> McpServerBuilder {
        McpServerBuilder::new(name, version)
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.inner.tools
    }

    pub fn resources(&self) -> &Arc<ResourceRegistry> {
        &self.inner.resources
    }

    pub fn prompts(&self) -> &Arc<PromptRegistry> {
        &self.inner.prompts
    }

    /// Capabilities advertised in every initialize result.
    pub fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(true),
            }),
            resources: Some(ResourcesCapability {
                subscribe: Some(true),
                list_changed: Some(true),
            }),
            prompts: Some(PromptsCapability {
                list_changed: Some(true),
            }),
            experimental: None,
        }
    }

    /// Capabilities the named peer declared at initialize, if it has.
    pub fn peer_capabilities(&self, session_id: &str) -> Option<ClientCapabilities> {
        self.inner
            .peer_capabilities
            .read()
            .ok()
            .and_then(|peers| peers.get(session_id).cloned())
    }

    pub fn session_count(&self) -> usize {
        self.inner
            .sessions
            .read()
            .map(|sessions| sessions.len())
            .unwrap_or(0)
    }

    /// Serve one transport: bind the method handlers, spawn the session,
    /// and track it until its transport closes.
    pub fn serve(&self, transport: Transport) -> Arc<Session> {
        let session_id = format!(
            "session-{}",
            self.inner.session_counter.fetch_add(1, Ordering::Relaxed)
        );
        info!(session_id = %session_id, server = %self.inner.info.name, "serving new session");

        let gate = Arc::new(InitializeGate::new());
        let mut handlers = HandlerRegistry::new();
        handlers.register_request(
            methods::INITIALIZE,
            Arc::new(InitializeHandler {
                info: self.inner.info.clone(),
                capabilities: self.capabilities(),
                instructions: self.inner.instructions.clone(),
                gate: gate.clone(),
                session_id: session_id.clone(),
                peer_capabilities: self.inner.peer_capabilities.clone(),
            }),
        );
        handlers.register_request(methods::PING, Arc::new(PingHandler));
        handlers.register_request(
            methods::TOOLS_LIST,
            Arc::new(ListToolsHandler {
                tools: self.inner.tools.clone(),
            }),
        );
        handlers.register_request(
            methods::TOOLS_CALL,
            Arc::new(CallToolHandler {
                tools: self.inner.tools.clone(),
            }),
        );
        handlers.register_request(
            methods::RESOURCES_LIST,
            Arc::new(ListResourcesHandler {
                resources: self.inner.resources.clone(),
            }),
        );
        handlers.register_request(
            methods::RESOURCES_TEMPLATES_LIST,
            Arc::new(ListResourceTemplatesHandler {
                resources: self.inner.resources.clone(),
            }),
        );
        handlers.register_request(
            methods::RESOURCES_READ,
            Arc::new(ReadResourceHandler {
                resources: self.inner.resources.clone(),
            }),
        );
        handlers.register_request(
            methods::RESOURCES_SUBSCRIBE,
            Arc::new(SubscribeHandler {
                resources: self.inner.resources.clone(),
                session_id: session_id.clone(),
            }),
        );
        handlers.register_request(
            methods::RESOURCES_UNSUBSCRIBE,
            Arc::new(UnsubscribeHandler {
                resources: self.inner.resources.clone(),
                session_id: session_id.clone(),
            }),
        );
        handlers.register_request(
            methods::PROMPTS_LIST,
            Arc::new(ListPromptsHandler {
                prompts: self.inner.prompts.clone(),
            }),
        );
        handlers.register_request(
            methods::PROMPTS_GET,
            Arc::new(GetPromptHandler {
                prompts: self.inner.prompts.clone(),
            }),
        );
        handlers.register_notification(
            methods::NOTIFICATION_INITIALIZED,
            Arc::new(InitializedNotificationHandler {
                session_id: session_id.clone(),
            }),
        );

        let session = SessionBuilder::new()
            .with_handlers(handlers)
            .with_config(self.inner.config.clone())
            .with_gate(gate)
            .build(transport);

        if let Ok(mut sessions) = self.inner.sessions.write() {
            sessions.insert(session_id.clone(), session.outbound());
        }

        // Subscriptions and peer state live only as long as the session.
        let inner = self.inner.clone();
        let watched = session.clone();
        let watched_id = session_id;
        tokio::spawn(async move {
            watched.closed().await;
            debug!(session_id = %watched_id, "session closed, releasing state");
            inner.resources.unsubscribe_all(&watched_id);
            if let Ok(mut sessions) = inner.sessions.write() {
                sessions.remove(&watched_id);
            }
            if let Ok(mut peers) = inner.peer_capabilities.write() {
                peers.remove(&watched_id);
            }
        });

        session
    }
}

/// Builds an [`McpServer`] and wires the registry change callbacks to
/// session notifications.
pub struct McpServerBuilder {
    info: Implementation,
    instructions: Option<String>,
    config: SessionConfig,
}

impl McpServerBuilder {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: Implementation::new(name, version),
            instructions: None,
            config: SessionConfig::default(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.info.title = Some(title.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> McpServer {
        let tools = Arc::new(ToolRegistry::new());
        let resources = Arc::new(ResourceRegistry::new());
        let prompts = Arc::new(PromptRegistry::new());
        let sessions: SessionMap = Arc::new(RwLock::new(HashMap::new()));

        tools.set_notify_callback(broadcast(
            sessions.clone(),
            methods::NOTIFICATION_TOOLS_LIST_CHANGED,
        ));
        resources.set_notify_callback(broadcast(
            sessions.clone(),
            methods::NOTIFICATION_RESOURCES_LIST_CHANGED,
        ));
        prompts.set_notify_callback(broadcast(
            sessions.clone(),
            methods::NOTIFICATION_PROMPTS_LIST_CHANGED,
        ));

        // Updates are addressed, not broadcast: one notification per
        // subscriber, routed by session id.
        let update_sessions = sessions.clone();
        resources.set_update_callback(move |uri, subscriber| {
            let outbound = update_sessions
                .read()
                .ok()
                .and_then(|sessions| sessions.get(subscriber).cloned());
            if let Some(outbound) = outbound {
                let params = ResourceUpdatedParams {
                    uri: uri.to_string(),
                };
                if let Ok(value) = serde_json::to_value(&params) {
                    outbound.notify(methods::NOTIFICATION_RESOURCES_UPDATED, Some(value));
                }
            }
        });

        McpServer {
            inner: Arc::new(ServerInner {
                info: self.info,
                instructions: self.instructions,
                config: self.config,
                tools,
                resources,
                prompts,
                peer_capabilities: Arc::new(RwLock::new(HashMap::new())),
                sessions,
                session_counter: AtomicU64::new(0),
            }),
        }
    }
}

fn broadcast(sessions: SessionMap, method: &'static str) -> impl Fn() + Send + Sync + 'static {
    move || {
        let outbounds: Vec<Outbound> = sessions
            .read()
            .map(|sessions| sessions.values().cloned().collect())
            .unwrap_or_default();
        for outbound in outbounds {
            outbound.notify(method, None);
        }
    }
}
