//! Prompt registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use mcplex_protocol::meta::Cursor;
use mcplex_protocol::prompts::{GetPromptResult, Prompt};
use mcplex_protocol::{McpError, McpResult};

use crate::pagination::{Page, paginate};

/// Expands one prompt into messages.
#[async_trait]
pub trait PromptHandler: Send + Sync {
    async fn get(
        &self,
        arguments: HashMap<String, String>,
        ctx: mcplex_session::RequestContext,
    ) -> McpResult<GetPromptResult>;
}

type NotifyFn = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
struct PromptEntry {
    prompt: Prompt,
    handler: Arc<dyn PromptHandler>,
}

/// Prompts keyed by unique name, listed in registration order.
pub struct PromptRegistry {
    entries: RwLock<Vec<PromptEntry>>,
    notify: Mutex<Option<NotifyFn>>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            notify: Mutex::new(None),
        }
    }

    /// Register a prompt. Fails on a duplicate name.
    pub fn register(&self, prompt: Prompt, handler: Arc<dyn PromptHandler>) -> McpResult<()> {
        {
            let mut entries = self.write();
            if entries.iter().any(|e| e.prompt.name == prompt.name) {
                return Err(McpError::DuplicateRegistration(prompt.name));
            }
            entries.push(PromptEntry { prompt, handler });
        }
        self.fire_notify();
        Ok(())
    }

    /// Remove a prompt by name. Idempotent.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = {
            let mut entries = self.write();
            let before = entries.len();
            entries.retain(|e| e.prompt.name != name);
            entries.len() != before
        };
        if removed {
            self.fire_notify();
        }
        removed
    }

    pub fn list(&self) -> Vec<Prompt> {
        self.read().iter().map(|e| e.prompt.clone()).collect()
    }

    pub fn list_paginated(
        &self,
        cursor: Option<&Cursor>,
        limit: Option<usize>,
    ) -> McpResult<Page<Prompt>> {
        paginate(&self.list(), cursor, limit)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Expand a prompt, enforcing its required arguments first.
    pub async fn get(
        &self,
        name: &str,
        arguments: HashMap<String, String>,
        ctx: mcplex_session::RequestContext,
    ) -> McpResult<GetPromptResult> {
        let entry = self
            .read()
            .iter()
            .find(|e| e.prompt.name == name)
            .cloned()
            .ok_or_else(|| McpError::PromptNotFound(name.to_string()))?;

        for argument in &entry.prompt.arguments {
            if argument.is_required() && !arguments.contains_key(&argument.name) {
                return Err(McpError::MissingParameter(format!(
                    "prompt '{name}' requires argument '{}'",
                    argument.name
                )));
            }
        }

        entry.handler.get(arguments, ctx).await
    }

    /// Install the list-changed callback.
    pub fn set_notify_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.notify.lock().unwrap_or_else(|p| p.into_inner()) = Some(Arc::new(callback));
    }

    fn fire_notify(&self) {
        let callback = self
            .notify
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<PromptEntry>> {
        self.entries.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<PromptEntry>> {
        self.entries.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for PromptRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplex_protocol::RequestId;
    use mcplex_protocol::prompts::{PromptArgument, PromptMessage};

    struct GreetingPrompt;

    #[async_trait]
    impl PromptHandler for GreetingPrompt {
        async fn get(
            &self,
            arguments: HashMap<String, String>,
            _ctx: mcplex_session::RequestContext,
        ) -> McpResult<GetPromptResult> {
            let name = arguments.get("name").cloned().unwrap_or_default();
            Ok(GetPromptResult {
                description: None,
                messages: vec![PromptMessage::user_text(format!("Greet {name}"))],
            })
        }
    }

    fn ctx() -> mcplex_session::RequestContext {
        mcplex_session::RequestContext::detached(RequestId::Number(0))
    }

    fn greeting() -> Prompt {
        Prompt::new("greeting").with_argument(PromptArgument::new("name").required())
    }

    #[tokio::test]
    async fn test_get_expands_messages() {
        let registry = PromptRegistry::new();
        registry.register(greeting(), Arc::new(GreetingPrompt)).unwrap();

        let mut args = HashMap::new();
        args.insert("name".to_string(), "alice".to_string());
        let result = registry.get("greeting", args, ctx()).await.unwrap();
        assert_eq!(result.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let registry = PromptRegistry::new();
        registry.register(greeting(), Arc::new(GreetingPrompt)).unwrap();

        let err = registry.get("greeting", HashMap::new(), ctx()).await.unwrap_err();
        assert!(matches!(err, McpError::MissingParameter(_)));
    }

    #[tokio::test]
    async fn test_unknown_prompt() {
        let registry = PromptRegistry::new();
        let err = registry.get("nope", HashMap::new(), ctx()).await.unwrap_err();
        assert!(matches!(err, McpError::PromptNotFound(_)));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let registry = PromptRegistry::new();
        registry.register(greeting(), Arc::new(GreetingPrompt)).unwrap();
        assert!(registry.register(greeting(), Arc::new(GreetingPrompt)).is_err());
    }
}
