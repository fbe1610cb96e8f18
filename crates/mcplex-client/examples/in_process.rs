//! A client and server wired back-to-back in one process.
//!
//!   cargo run --example in_process

use std::sync::Arc;

use async_trait::async_trait;
use mcplex_client::prelude::*;
use mcplex_server::{McpServer, ToolHandler};
use mcplex_session::RequestContext;
use mcplex_transport::ChannelTransport;
use serde_json::{Map, Value, json};

struct Shout;

#[async_trait]
impl ToolHandler for Shout {
    async fn call(
        &self,
        arguments: Map<String, Value>,
        _ctx: RequestContext,
    ) -> McpResult<CallToolResult> {
        let text = arguments
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or_default();
        Ok(CallToolResult::text(text.to_uppercase()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let server = McpServer::builder("shout-server", "0.1.0").build();
    server.tools().register(
        Tool::new(
            "shout",
            JsonSchema::object().with_property("text", JsonSchema::string()),
        )
        .with_description("Upper-cases its input"),
        Arc::new(Shout),
    )?;

    let (client_end, server_end) = ChannelTransport::pair();
    let _server_session = server.serve(server_end);

    let client = McpClient::builder("example-client", "0.1.0")
        .with_roots(vec![Root::new("file:///tmp/workspace")])
        .connect(client_end)
        .await?;

    println!("connected to {}", client.server_info().name);
    for tool in client.list_tools().await? {
        println!("tool: {}", tool.name);
    }

    let result = client.call_tool("shout", json!({"text": "hello"})).await?;
    println!("shout(hello) = {:?}", result.content[0].as_text());
    Ok(())
}
