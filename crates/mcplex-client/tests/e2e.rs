//! Client/server end-to-end tests over in-memory transports.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use mcplex_client::{ElicitationHandler, LlmHandler, McpClient, ToolLoopConfig};
use mcplex_protocol::content::ContentBlock;
use mcplex_protocol::elicitation::{ElicitAction, ElicitCreateParams, ElicitResult, ElicitValue};
use mcplex_protocol::prompts::{GetPromptResult, Prompt, PromptArgument, PromptMessage};
use mcplex_protocol::resources::Resource;
use mcplex_protocol::roots::Root;
use mcplex_protocol::sampling::{
    CreateMessageParams, CreateMessageResult, Role, SamplingMessage, StopReason,
};
use mcplex_protocol::schema::JsonSchema;
use mcplex_protocol::tools::{CallToolResult, Tool};
use mcplex_protocol::{McpResult, methods};
use mcplex_server::{
    McpServer, PromptHandler, ResourceHandler, ToolHandler,
};
use mcplex_session::{NotificationHandler, RequestContext};
use mcplex_transport::ChannelTransport;
use serde_json::{Map, Value, json};

struct CalculateTool;

#[async_trait]
impl ToolHandler for CalculateTool {
    async fn call(
        &self,
        arguments: Map<String, Value>,
        _ctx: RequestContext,
    ) -> McpResult<CallToolResult> {
        let operation = arguments
            .get("operation")
            .and_then(Value::as_str)
            .unwrap_or("add");
        let a = arguments.get("a").and_then(Value::as_f64).unwrap_or(0.0);
        let b = arguments.get("b").and_then(Value::as_f64).unwrap_or(0.0);
        let result = match operation {
            "add" => a + b,
            "sub" => a - b,
            other => {
                return Ok(CallToolResult::error(format!("unknown operation '{other}'")));
            }
        };
        Ok(CallToolResult::text(format!("{result}")))
    }
}

fn calculate_tool() -> Tool {
    Tool::new(
        "calculate",
        JsonSchema::object()
            .with_property(
                "operation",
                JsonSchema::string().with_enum(vec![json!("add"), json!("sub")]),
            )
            .with_property("a", JsonSchema::number())
            .with_property("b", JsonSchema::number())
            .with_required(vec!["operation", "a", "b"]),
    )
}

struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    async fn call(
        &self,
        arguments: Map<String, Value>,
        _ctx: RequestContext,
    ) -> McpResult<CallToolResult> {
        let text = arguments
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(CallToolResult::text(text))
    }
}

struct StaticResource;

#[async_trait]
impl ResourceHandler for StaticResource {
    async fn read(
        &self,
        uri: &str,
        _variables: HashMap<String, String>,
        _ctx: RequestContext,
    ) -> McpResult<Vec<mcplex_protocol::content::ResourceContents>> {
        Ok(vec![mcplex_protocol::content::ResourceContents::text(
            uri, "contents",
        )])
    }
}

struct GreetingPrompt;

#[async_trait]
impl PromptHandler for GreetingPrompt {
    async fn get(
        &self,
        arguments: HashMap<String, String>,
        _ctx: RequestContext,
    ) -> McpResult<GetPromptResult> {
        let name = arguments.get("name").cloned().unwrap_or_default();
        Ok(GetPromptResult {
            description: None,
            messages: vec![PromptMessage::user_text(format!("Say hello to {name}"))],
        })
    }
}

fn test_server() -> McpServer {
    McpServer::builder("test-server", "1.0").build()
}

async fn connect_client(server: &McpServer) -> McpClient {
    let (client_end, server_end) = ChannelTransport::pair();
    let _session = server.serve(server_end);
    McpClient::builder("test-client", "1.0")
        .connect(client_end)
        .await
        .expect("connect")
}

#[tokio::test]
async fn test_initialize_then_list_tools() {
    let server = test_server();
    server
        .tools()
        .register(
            Tool::new("echo", JsonSchema::object().with_property("text", JsonSchema::string())),
            Arc::new(EchoTool),
        )
        .unwrap();

    let client = connect_client(&server).await;
    assert_eq!(client.server_info().name, "test-server");

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "echo");
}

#[tokio::test]
async fn test_calculate_tool_add() {
    let server = test_server();
    server
        .tools()
        .register(calculate_tool(), Arc::new(CalculateTool))
        .unwrap();

    let client = connect_client(&server).await;
    let result = client
        .call_tool("calculate", json!({"operation": "add", "a": 5, "b": 3}))
        .await
        .unwrap();

    assert!(!result.is_error());
    assert_eq!(result.content.len(), 1);
    assert_eq!(result.content[0].as_text(), Some("8"));
}

#[tokio::test]
async fn test_schema_violation_returns_is_error() {
    let server = test_server();
    server
        .tools()
        .register(calculate_tool(), Arc::new(CalculateTool))
        .unwrap();

    let client = connect_client(&server).await;
    let result = client
        .call_tool("calculate", json!({"operation": "add", "a": 5}))
        .await
        .unwrap();
    assert!(result.is_error());
}

#[tokio::test]
async fn test_unknown_tool_is_rpc_error() {
    let server = test_server();
    let client = connect_client(&server).await;
    let err = client.call_tool("missing", json!({})).await.unwrap_err();
    assert_eq!(err.code(), mcplex_protocol::error_codes::INVALID_PARAMS);
}

#[tokio::test]
async fn test_pagination_across_25_tools() {
    let server = test_server();
    for i in 0..25 {
        server
            .tools()
            .register(Tool::new(format!("t{i:02}"), JsonSchema::object()), Arc::new(EchoTool))
            .unwrap();
    }

    let client = connect_client(&server).await;
    let all = client.list_all_tools().await.unwrap();
    let names: Vec<&str> = all.iter().map(|t| t.name.as_str()).collect();
    let expected: Vec<String> = (0..25).map(|i| format!("t{i:02}")).collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn test_resources_read_and_templates() {
    let server = test_server();
    server
        .resources()
        .register(Resource::new("file:///greeting.txt"), Arc::new(StaticResource))
        .unwrap();
    server
        .resources()
        .register_template(
            mcplex_protocol::resources::ResourceTemplate::new("file:///users/{user_id}.json"),
            Arc::new(StaticResource),
        )
        .unwrap();

    let client = connect_client(&server).await;

    let resources = client.list_resources().await.unwrap();
    assert_eq!(resources.len(), 1);

    let templates = client.list_resource_templates().await.unwrap();
    assert_eq!(templates.len(), 1);

    let contents = client.read_resource("file:///greeting.txt").await.unwrap();
    assert_eq!(contents[0].uri(), "file:///greeting.txt");

    // Template-backed read.
    let contents = client
        .read_resource("file:///users/alice.json")
        .await
        .unwrap();
    assert_eq!(contents[0].uri(), "file:///users/alice.json");
}

struct CountingNotifications {
    count: Arc<AtomicUsize>,
}

#[async_trait]
impl NotificationHandler for CountingNotifications {
    async fn handle(&self, _params: Option<Value>) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn test_resource_subscription_fan_out() {
    let server = test_server();
    server
        .resources()
        .register(Resource::new("file:///x"), Arc::new(StaticResource))
        .unwrap();

    let updates_a = Arc::new(AtomicUsize::new(0));
    let updates_b = Arc::new(AtomicUsize::new(0));

    let (end_a, server_end_a) = ChannelTransport::pair();
    let _session_a = server.serve(server_end_a);
    let client_a = McpClient::builder("client-a", "1.0")
        .on_notification(
            methods::NOTIFICATION_RESOURCES_UPDATED,
            Arc::new(CountingNotifications {
                count: updates_a.clone(),
            }),
        )
        .connect(end_a)
        .await
        .unwrap();

    let (end_b, server_end_b) = ChannelTransport::pair();
    let _session_b = server.serve(server_end_b);
    let client_b = McpClient::builder("client-b", "1.0")
        .on_notification(
            methods::NOTIFICATION_RESOURCES_UPDATED,
            Arc::new(CountingNotifications {
                count: updates_b.clone(),
            }),
        )
        .connect(end_b)
        .await
        .unwrap();

    client_a.subscribe_resource("file:///x").await.unwrap();
    client_b.subscribe_resource("file:///x").await.unwrap();

    assert_eq!(server.resources().notify_updated("file:///x"), 2);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(updates_a.load(Ordering::SeqCst), 1);
    assert_eq!(updates_b.load(Ordering::SeqCst), 1);

    client_a.unsubscribe_resource("file:///x").await.unwrap();
    assert_eq!(server.resources().notify_updated("file:///x"), 1);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(updates_a.load(Ordering::SeqCst), 1);
    assert_eq!(updates_b.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_list_changed_notification_on_late_registration() {
    let server = test_server();
    let changes = Arc::new(AtomicUsize::new(0));

    let (client_end, server_end) = ChannelTransport::pair();
    let _session = server.serve(server_end);
    let _client = McpClient::builder("client", "1.0")
        .on_notification(
            methods::NOTIFICATION_TOOLS_LIST_CHANGED,
            Arc::new(CountingNotifications {
                count: changes.clone(),
            }),
        )
        .connect(client_end)
        .await
        .unwrap();

    server
        .tools()
        .register(Tool::new("late", JsonSchema::object()), Arc::new(EchoTool))
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(changes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_prompts_get_with_required_argument() {
    let server = test_server();
    server
        .prompts()
        .register(
            Prompt::new("greeting").with_argument(PromptArgument::new("name").required()),
            Arc::new(GreetingPrompt),
        )
        .unwrap();

    let client = connect_client(&server).await;

    let prompts = client.list_prompts().await.unwrap();
    assert_eq!(prompts.len(), 1);

    let result = client
        .get_prompt("greeting", json!({"name": "alice"}))
        .await
        .unwrap();
    assert_eq!(result.messages.len(), 1);

    let err = client.get_prompt("greeting", json!({})).await.unwrap_err();
    assert_eq!(err.code(), mcplex_protocol::error_codes::INVALID_PARAMS);
}

#[tokio::test]
async fn test_roots_list_from_server_side() {
    let server = test_server();
    let (client_end, server_end) = ChannelTransport::pair();
    let server_session = server.serve(server_end);

    let _client = McpClient::builder("client", "1.0")
        .with_roots(vec![Root::new("file:///workspace").with_name("workspace")])
        .connect(client_end)
        .await
        .unwrap();

    let value = server_session
        .request(methods::ROOTS_LIST, Some(json!({})))
        .await
        .unwrap();
    assert_eq!(value["roots"][0]["uri"], "file:///workspace");
}

/// Uses the `echo` tool once, then answers.
struct OneToolLlm {
    calls: AtomicUsize,
}

#[async_trait]
impl LlmHandler for OneToolLlm {
    async fn create_message(&self, params: CreateMessageParams) -> McpResult<CreateMessageResult> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            let mut arguments = Map::new();
            arguments.insert("text".to_string(), json!("pong"));
            Ok(CreateMessageResult {
                role: Role::Assistant,
                content: ContentBlock::tool_use("tu-0", "echo", arguments).into(),
                model: "fake-llm".to_string(),
                stop_reason: Some(StopReason::ToolUse),
            })
        } else {
            // The tool result from the previous round is visible here.
            let saw_tool_result = params.messages.iter().any(|m| {
                m.content
                    .blocks()
                    .iter()
                    .any(|b| matches!(b, ContentBlock::ToolResult { .. }))
            });
            assert!(saw_tool_result, "tool results should be appended");
            Ok(CreateMessageResult::assistant_text("fake-llm", "echoed: pong"))
        }
    }
}

#[tokio::test]
async fn test_sampling_tool_loop_end_to_end() {
    let server = test_server();
    server
        .tools()
        .register(
            Tool::new("echo", JsonSchema::object().with_property("text", JsonSchema::string())),
            Arc::new(EchoTool),
        )
        .unwrap();

    let (client_end, server_end) = ChannelTransport::pair();
    let server_session = server.serve(server_end);

    let _client = McpClient::builder("client", "1.0")
        .with_llm_handler(Arc::new(OneToolLlm {
            calls: AtomicUsize::new(0),
        }))
        .with_tool_loop_config(ToolLoopConfig {
            max_iterations: 5,
            timeout: Duration::from_secs(30),
        })
        .connect(client_end)
        .await
        .unwrap();

    // Server asks the client's LLM to sample, with the echo tool attached.
    let params = CreateMessageParams::new(vec![SamplingMessage::user_text("ping?")], 64)
        .with_tools(vec![Tool::new(
            "echo",
            JsonSchema::object().with_property("text", JsonSchema::string()),
        )]);
    let value = server_session
        .request(
            methods::SAMPLING_CREATE_MESSAGE,
            Some(serde_json::to_value(&params).unwrap()),
        )
        .await
        .unwrap();
    let result: CreateMessageResult = serde_json::from_value(value).unwrap();
    assert_eq!(result.content.blocks()[0].as_text(), Some("echoed: pong"));
}

struct AutoForm;

#[async_trait]
impl ElicitationHandler for AutoForm {
    async fn elicit(&self, request: ElicitCreateParams) -> McpResult<ElicitResult> {
        match request {
            ElicitCreateParams::Form { .. } => {
                let mut content = HashMap::new();
                content.insert("token".to_string(), ElicitValue::String("abc".to_string()));
                Ok(ElicitResult::accept(content))
            }
            ElicitCreateParams::Url { .. } => Ok(ElicitResult::accepted()),
        }
    }
}

#[tokio::test]
async fn test_elicitation_form_and_url_modes() {
    let server = test_server();
    let (client_end, server_end) = ChannelTransport::pair();
    let server_session = server.serve(server_end);

    let client = McpClient::builder("client", "1.0")
        .with_elicitation_handler(Arc::new(AutoForm))
        .connect(client_end)
        .await
        .unwrap();

    // Form mode resolves synchronously.
    let mut schema = HashMap::new();
    schema.insert(
        "token".to_string(),
        mcplex_protocol::elicitation::PrimitiveSchema::string(),
    );
    let form = ElicitCreateParams::form("Paste the token", schema);
    let value = server_session
        .request(
            methods::ELICITATION_CREATE,
            Some(serde_json::to_value(&form).unwrap()),
        )
        .await
        .unwrap();
    let result: ElicitResult = serde_json::from_value(value).unwrap();
    assert_eq!(result.action, ElicitAction::Accept);
    assert!(result.content.unwrap().contains_key("token"));

    // URL mode acks immediately, then completes via notification.
    let url = ElicitCreateParams::url("Authorize", "e-99", "https://example.com/auth");
    let value = server_session
        .request(
            methods::ELICITATION_CREATE,
            Some(serde_json::to_value(&url).unwrap()),
        )
        .await
        .unwrap();
    let ack: ElicitResult = serde_json::from_value(value).unwrap();
    assert_eq!(ack.action, ElicitAction::Accept);

    let engine = client.elicitation().unwrap();
    assert_eq!(engine.pending_count(), 1);

    server_session.notify(
        methods::NOTIFICATION_ELICITATION_COMPLETE,
        Some(json!({"elicitationId": "e-99", "action": "decline"})),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test]
async fn test_ping_both_directions() {
    let server = test_server();
    let (client_end, server_end) = ChannelTransport::pair();
    let server_session = server.serve(server_end);
    let client = McpClient::builder("client", "1.0")
        .connect(client_end)
        .await
        .unwrap();

    client.ping().await.unwrap();
    server_session
        .request(methods::PING, Some(json!({})))
        .await
        .unwrap();
}
