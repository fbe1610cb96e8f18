//! Minimal calculator server over stdio.
//!
//! Run it under any MCP client:
//!   cargo run --example calculator_stdio

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mcplex_server::prelude::*;
use mcplex_transport::StdioTransport;
use serde_json::{Map, Value, json};

struct Calculate;

#[async_trait]
impl ToolHandler for Calculate {
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
            "subtract" => a - b,
            "multiply" => a * b,
            "divide" if b != 0.0 => a / b,
            "divide" => return Ok(CallToolResult::error("division by zero")),
            other => return Ok(CallToolResult::error(format!("unknown operation '{other}'"))),
        };
        Ok(CallToolResult::text(format!("{result}")))
    }
}

struct Readme;

#[async_trait]
impl ResourceHandler for Readme {
    async fn read(
        &self,
        uri: &str,
        _variables: HashMap<String, String>,
        _ctx: RequestContext,
    ) -> McpResult<Vec<ResourceContents>> {
        Ok(vec![ResourceContents::text_with_mime(
            uri,
            "A calculator server with one tool.",
            "text/plain",
        )])
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Log to stderr: stdout carries the protocol.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let server = McpServer::builder("calculator", env!("CARGO_PKG_VERSION"))
        .with_instructions("Use the calculate tool for arithmetic.")
        .build();

    server.tools().register(
        Tool::new(
            "calculate",
            JsonSchema::object()
                .with_property(
                    "operation",
                    JsonSchema::string().with_enum(vec![
                        json!("add"),
                        json!("subtract"),
                        json!("multiply"),
                        json!("divide"),
                    ]),
                )
                .with_property("a", JsonSchema::number())
                .with_property("b", JsonSchema::number())
                .with_required(vec!["operation", "a", "b"]),
        )
        .with_description("Basic arithmetic over two numbers"),
        Arc::new(Calculate),
    )?;

    server.resources().register(
        Resource::new("file:///README.txt").with_name("readme"),
        Arc::new(Readme),
    )?;

    let session = server.serve(StdioTransport::stdio());
    session.closed().await;
    Ok(())
}
