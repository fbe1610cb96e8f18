//! Tool registry: ordered registration, schema-checked dispatch, and
//! change notification.

use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use mcplex_protocol::meta::Cursor;
use mcplex_protocol::tools::{CallToolResult, Tool};
use mcplex_protocol::{McpError, McpResult};
use serde_json::{Map, Value};
use tracing::debug;

use crate::pagination::{Page, paginate};

/// Executes one tool. Errors become `isError` results at the dispatch
/// boundary, so the model can see and recover from them.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(
        &self,
        arguments: Map<String, Value>,
        ctx: mcplex_session::RequestContext,
    ) -> McpResult<CallToolResult>;
}

type NotifyFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
struct ToolEntry {
    tool: Tool,
    handler: Arc<dyn ToolHandler>,
}

/// Tools keyed by unique name, listed in registration order.
pub struct ToolRegistry {
    entries: RwLock<Vec<ToolEntry>>,
    notify: Mutex<Option<NotifyFn>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            notify: Mutex::new(None),
        }
    }

    /// Register a tool. Fails on a duplicate name.
    pub fn register(&self, tool: Tool, handler: Arc<dyn ToolHandler>) -> McpResult<()> {
        {
            let mut entries = self.write();
            if entries.iter().any(|e| e.tool.name == tool.name) {
                return Err(McpError::DuplicateRegistration(tool.name));
            }
            entries.push(ToolEntry { tool, handler });
        }
        self.fire_notify();
        Ok(())
    }

    /// Remove a tool by name. Idempotent; returns whether anything changed.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = {
            let mut entries = self.write();
            let before = entries.len();
            entries.retain(|e| e.tool.name != name);
            entries.len() != before
        };
        if removed {
            self.fire_notify();
        }
        removed
    }

    pub fn list(&self) -> Vec<Tool> {
        self.read().iter().map(|e| e.tool.clone()).collect()
    }

    pub fn list_paginated(
        &self,
        cursor: Option<&Cursor>,
        limit: Option<usize>,
    ) -> McpResult<Page<Tool>> {
        paginate(&self.list(), cursor, limit)
    }

    pub fn get(&self, name: &str) -> Option<Tool> {
        self.read()
            .iter()
            .find(|e| e.tool.name == name)
            .map(|e| e.tool.clone())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Dispatch a call.
    ///
    /// Unknown names are invalid-params errors; schema violations and
    /// handler failures both come back as `isError` results.
    pub async fn call(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        ctx: mcplex_session::RequestContext,
    ) -> McpResult<CallToolResult> {
        let entry = self
            .read()
            .iter()
            .find(|e| e.tool.name == name)
            .cloned()
            .ok_or_else(|| McpError::ToolNotFound(name.to_string()))?;

        if let Err(diagnostic) = entry
            .tool
            .input_schema
            .validate(&Value::Object(arguments.clone()))
        {
            debug!(tool = name, %diagnostic, "rejecting arguments");
            return Ok(CallToolResult::error(format!(
                "invalid arguments for '{name}': {diagnostic}"
            )));
        }

        match entry.handler.call(arguments, ctx).await {
            Ok(result) => Ok(result),
            Err(e) => Ok(CallToolResult::error(e.to_string())),
        }
    }

    /// Install the change callback the owning session uses to emit
    /// `notifications/tools/list_changed`.
    pub fn set_notify_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.notify_lock() = Some(Arc::new(callback));
    }

    fn fire_notify(&self) {
        let callback = self.notify_lock().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<ToolEntry>> {
        self.entries.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<ToolEntry>> {
        self.entries.write().unwrap_or_else(|p| p.into_inner())
    }

    fn notify_lock(&self) -> std::sync::MutexGuard<'_, Option<NotifyFn>> {
        self.notify.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplex_protocol::schema::JsonSchema;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AddTool;

    #[async_trait]
    impl ToolHandler for AddTool {
        async fn call(
            &self,
            arguments: Map<String, Value>,
            _ctx: mcplex_session::RequestContext,
        ) -> McpResult<CallToolResult> {
            let a = arguments.get("a").and_then(Value::as_f64).unwrap_or(0.0);
            let b = arguments.get("b").and_then(Value::as_f64).unwrap_or(0.0);
            Ok(CallToolResult::text(format!("{}", a + b)))
        }
    }

    struct FailingTool;

    #[async_trait]
    impl ToolHandler for FailingTool {
        async fn call(
            &self,
            _arguments: Map<String, Value>,
            _ctx: mcplex_session::RequestContext,
        ) -> McpResult<CallToolResult> {
            Err(McpError::ToolExecutionError("backend offline".to_string()))
        }
    }

    fn add_tool() -> Tool {
        Tool::new(
            "add",
            JsonSchema::object()
                .with_property("a", JsonSchema::number())
                .with_property("b", JsonSchema::number())
                .with_required(vec!["a", "b"]),
        )
    }

    fn test_ctx() -> mcplex_session::RequestContext {
        mcplex_session::RequestContext::detached(mcplex_protocol::RequestId::Number(0))
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = ToolRegistry::new();
        registry.register(add_tool(), Arc::new(AddTool)).unwrap();
        let err = registry.register(add_tool(), Arc::new(AddTool)).unwrap_err();
        assert!(matches!(err, McpError::DuplicateRegistration(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister_idempotent() {
        let registry = ToolRegistry::new();
        registry.register(add_tool(), Arc::new(AddTool)).unwrap();
        assert!(registry.unregister("add"));
        assert!(!registry.unregister("add"));
    }

    #[test]
    fn test_notify_fires_on_register_and_unregister() {
        let registry = ToolRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        registry.set_notify_callback(move || {
            count2.fetch_add(1, Ordering::SeqCst);
        });

        registry.register(add_tool(), Arc::new(AddTool)).unwrap();
        registry.unregister("add");
        // A no-op unregister fires nothing.
        registry.unregister("add");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_call_dispatches() {
        let registry = ToolRegistry::new();
        registry.register(add_tool(), Arc::new(AddTool)).unwrap();
        let result = registry
            .call("add", args(json!({"a": 5, "b": 3})), test_ctx())
            .await
            .unwrap();
        assert!(!result.is_error());
        assert_eq!(result.content[0].as_text(), Some("8"));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_invalid_params() {
        let registry = ToolRegistry::new();
        let err = registry
            .call("missing", Map::new(), test_ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, McpError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_schema_violation_is_error_result() {
        let registry = ToolRegistry::new();
        registry.register(add_tool(), Arc::new(AddTool)).unwrap();
        let result = registry
            .call("add", args(json!({"a": 5})), test_ctx())
            .await
            .unwrap();
        assert!(result.is_error());
        assert!(
            result.content[0]
                .as_text()
                .unwrap()
                .contains("invalid arguments")
        );
    }

    #[tokio::test]
    async fn test_handler_failure_is_error_result() {
        let registry = ToolRegistry::new();
        registry
            .register(
                Tool::new("broken", JsonSchema::object()),
                Arc::new(FailingTool),
            )
            .unwrap();
        let result = registry.call("broken", Map::new(), test_ctx()).await.unwrap();
        assert!(result.is_error());
        assert!(result.content[0].as_text().unwrap().contains("backend offline"));
    }

    #[test]
    fn test_pagination_registration_order() {
        let registry = ToolRegistry::new();
        for i in 0..25 {
            registry
                .register(Tool::new(format!("t{i:02}"), JsonSchema::object()), {
                    struct Nop;
                    #[async_trait]
                    impl ToolHandler for Nop {
                        async fn call(
                            &self,
                            _a: Map<String, Value>,
                            _c: mcplex_session::RequestContext,
                        ) -> McpResult<CallToolResult> {
                            Ok(CallToolResult::text(""))
                        }
                    }
                    Arc::new(Nop)
                })
                .unwrap();
        }

        let first = registry.list_paginated(None, Some(10)).unwrap();
        assert_eq!(first.items.len(), 10);
        assert!(first.has_more());

        let mut collected = Vec::new();
        let mut cursor = None;
        loop {
            let page = registry.list_paginated(cursor.as_ref(), Some(10)).unwrap();
            collected.extend(page.items.into_iter().map(|t| t.name));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        let expected: Vec<String> = (0..25).map(|i| format!("t{i:02}")).collect();
        assert_eq!(collected, expected);
    }
}
