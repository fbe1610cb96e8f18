//! Resource registry: exact URIs, URI templates, and per-URI subscriptions.
//!
//! Read resolution tries exact URIs first, then templates in registration
//! order; the first template that binds every placeholder wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use mcplex_protocol::content::ResourceContents;
use mcplex_protocol::meta::Cursor;
use mcplex_protocol::resources::{Resource, ResourceTemplate};
use mcplex_protocol::{McpError, McpResult};
use tracing::debug;

use crate::pagination::{Page, paginate};
use crate::uri_template::UriTemplate;

/// Produces the contents of a resource.
///
/// For template-backed resources, `variables` holds the placeholder
/// bindings; for exact resources it is empty.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    async fn read(
        &self,
        uri: &str,
        variables: HashMap<String, String>,
        ctx: mcplex_session::RequestContext,
    ) -> McpResult<Vec<ResourceContents>>;
}

type NotifyFn = Arc<dyn Fn() + Send + Sync>;
/// `(uri, subscriber)`; one invocation per subscriber per update.
type UpdateFn = Arc<dyn Fn(&str, &str) + Send + Sync>;

#[derive(Clone)]
struct ResourceEntry {
    resource: Resource,
    handler: Arc<dyn ResourceHandler>,
}

#[derive(Clone)]
struct TemplateEntry {
    template: ResourceTemplate,
    compiled: UriTemplate,
    handler: Arc<dyn ResourceHandler>,
}

/// Resources keyed by unique URI (or template), in registration order,
/// plus the subscription table.
pub struct ResourceRegistry {
    resources: RwLock<Vec<ResourceEntry>>,
    templates: RwLock<Vec<TemplateEntry>>,
    /// uri → subscriber ids, in subscription order
    subscriptions: RwLock<HashMap<String, Vec<String>>>,
    notify: Mutex<Option<NotifyFn>>,
    on_updated: Mutex<Option<UpdateFn>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self {
            resources: RwLock::new(Vec::new()),
            templates: RwLock::new(Vec::new()),
            subscriptions: RwLock::new(HashMap::new()),
            notify: Mutex::new(None),
            on_updated: Mutex::new(None),
        }
    }

    /// Register an exact-URI resource. Fails on a duplicate URI.
    pub fn register(&self, resource: Resource, handler: Arc<dyn ResourceHandler>) -> McpResult<()> {
        {
            let mut resources = lock_write(&self.resources);
            if resources.iter().any(|e| e.resource.uri == resource.uri) {
                return Err(McpError::DuplicateRegistration(resource.uri));
            }
            resources.push(ResourceEntry { resource, handler });
        }
        self.fire_notify();
        Ok(())
    }

    /// Register a template-backed resource family. Fails on a duplicate
    /// pattern or an uncompilable template.
    pub fn register_template(
        &self,
        template: ResourceTemplate,
        handler: Arc<dyn ResourceHandler>,
    ) -> McpResult<()> {
        let compiled = UriTemplate::compile(&template.uri_template)?;
        {
            let mut templates = lock_write(&self.templates);
            if templates
                .iter()
                .any(|e| e.template.uri_template == template.uri_template)
            {
                return Err(McpError::DuplicateRegistration(template.uri_template));
            }
            templates.push(TemplateEntry {
                template,
                compiled,
                handler,
            });
        }
        self.fire_notify();
        Ok(())
    }

    /// Remove an exact resource by URI. Idempotent.
    pub fn unregister(&self, uri: &str) -> bool {
        let removed = {
            let mut resources = lock_write(&self.resources);
            let before = resources.len();
            resources.retain(|e| e.resource.uri != uri);
            resources.len() != before
        };
        if removed {
            self.fire_notify();
        }
        removed
    }

    /// Remove a template by pattern. Idempotent.
    pub fn unregister_template(&self, uri_template: &str) -> bool {
        let removed = {
            let mut templates = lock_write(&self.templates);
            let before = templates.len();
            templates.retain(|e| e.template.uri_template != uri_template);
            templates.len() != before
        };
        if removed {
            self.fire_notify();
        }
        removed
    }

    pub fn list(&self) -> Vec<Resource> {
        lock_read(&self.resources)
            .iter()
            .map(|e| e.resource.clone())
            .collect()
    }

    pub fn list_templates(&self) -> Vec<ResourceTemplate> {
        lock_read(&self.templates)
            .iter()
            .map(|e| e.template.clone())
            .collect()
    }

    pub fn list_paginated(
        &self,
        cursor: Option<&Cursor>,
        limit: Option<usize>,
    ) -> McpResult<Page<Resource>> {
        paginate(&self.list(), cursor, limit)
    }

    pub fn list_templates_paginated(
        &self,
        cursor: Option<&Cursor>,
        limit: Option<usize>,
    ) -> McpResult<Page<ResourceTemplate>> {
        paginate(&self.list_templates(), cursor, limit)
    }

    /// Read the resource at `uri`: exact match first, then the first
    /// template that binds all variables.
    pub async fn read(
        &self,
        uri: &str,
        ctx: mcplex_session::RequestContext,
    ) -> McpResult<Vec<ResourceContents>> {
        let resolved = self.resolve(uri);
        match resolved {
            Some((handler, variables)) => handler.read(uri, variables, ctx).await,
            None => Err(McpError::ResourceNotFound(uri.to_string())),
        }
    }

    fn resolve(&self, uri: &str) -> Option<(Arc<dyn ResourceHandler>, HashMap<String, String>)> {
        if let Some(entry) = lock_read(&self.resources)
            .iter()
            .find(|e| e.resource.uri == uri)
        {
            return Some((entry.handler.clone(), HashMap::new()));
        }
        for entry in lock_read(&self.templates).iter() {
            if let Some(bindings) = entry.compiled.match_uri(uri) {
                return Some((entry.handler.clone(), bindings));
            }
        }
        None
    }

    /// Add `subscriber` to the URI's set. Re-subscribing is a no-op.
    pub fn subscribe(&self, uri: &str, subscriber: &str) {
        let mut subscriptions = lock_write(&self.subscriptions);
        let set = subscriptions.entry(uri.to_string()).or_default();
        if !set.iter().any(|s| s == subscriber) {
            set.push(subscriber.to_string());
        }
    }

    /// Remove `subscriber` from the URI's set. Idempotent.
    pub fn unsubscribe(&self, uri: &str, subscriber: &str) {
        let mut subscriptions = lock_write(&self.subscriptions);
        if let Some(set) = subscriptions.get_mut(uri) {
            set.retain(|s| s != subscriber);
            if set.is_empty() {
                subscriptions.remove(uri);
            }
        }
    }

    /// Drop every subscription held by `subscriber`, for when its session
    /// goes away.
    pub fn unsubscribe_all(&self, subscriber: &str) {
        let mut subscriptions = lock_write(&self.subscriptions);
        subscriptions.retain(|_, set| {
            set.retain(|s| s != subscriber);
            !set.is_empty()
        });
    }

    /// Current subscribers of `uri`, in subscription order.
    pub fn subscribers(&self, uri: &str) -> Vec<String> {
        lock_read(&self.subscriptions)
            .get(uri)
            .cloned()
            .unwrap_or_default()
    }

    /// Announce a change to `uri`: exactly one callback invocation per
    /// current subscriber, in subscription order. The subscriber set is
    /// snapshotted first so the callback runs without the lock held.
    pub fn notify_updated(&self, uri: &str) -> usize {
        let subscribers = self.subscribers(uri);
        let callback = lock_mutex(&self.on_updated).clone();
        let Some(callback) = callback else {
            debug!(uri, "resource update with no delivery callback");
            return 0;
        };
        for subscriber in &subscribers {
            callback(uri, subscriber);
        }
        subscribers.len()
    }

    /// Install the list-changed callback.
    pub fn set_notify_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *lock_mutex(&self.notify) = Some(Arc::new(callback));
    }

    /// Install the per-subscriber update delivery callback.
    pub fn set_update_callback(&self, callback: impl Fn(&str, &str) + Send + Sync + 'static) {
        *lock_mutex(&self.on_updated) = Some(Arc::new(callback));
    }

    fn fire_notify(&self) {
        let callback = lock_mutex(&self.notify).clone();
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|p| p.into_inner())
}

fn lock_write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|p| p.into_inner())
}

fn lock_mutex<T>(lock: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(|p| p.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcplex_protocol::RequestId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticResource {
        text: String,
    }

    #[async_trait]
    impl ResourceHandler for StaticResource {
        async fn read(
            &self,
            uri: &str,
            _variables: HashMap<String, String>,
            _ctx: mcplex_session::RequestContext,
        ) -> McpResult<Vec<ResourceContents>> {
            Ok(vec![ResourceContents::text(uri, self.text.clone())])
        }
    }

    struct TemplateResource;

    #[async_trait]
    impl ResourceHandler for TemplateResource {
        async fn read(
            &self,
            uri: &str,
            variables: HashMap<String, String>,
            _ctx: mcplex_session::RequestContext,
        ) -> McpResult<Vec<ResourceContents>> {
            let user = variables.get("user_id").cloned().unwrap_or_default();
            Ok(vec![ResourceContents::text(uri, format!("user={user}"))])
        }
    }

    fn ctx() -> mcplex_session::RequestContext {
        mcplex_session::RequestContext::detached(RequestId::Number(0))
    }

    fn text_of(contents: &[ResourceContents]) -> &str {
        match &contents[0] {
            ResourceContents::Text(t) => &t.text,
            ResourceContents::Blob(_) => panic!("expected text"),
        }
    }

    #[tokio::test]
    async fn test_exact_read() {
        let registry = ResourceRegistry::new();
        registry
            .register(
                Resource::new("file:///a.txt"),
                Arc::new(StaticResource {
                    text: "hello".to_string(),
                }),
            )
            .unwrap();
        let contents = registry.read("file:///a.txt", ctx()).await.unwrap();
        assert_eq!(text_of(&contents), "hello");
    }

    #[tokio::test]
    async fn test_exact_beats_template() {
        let registry = ResourceRegistry::new();
        registry
            .register_template(
                ResourceTemplate::new("file:///users/{user_id}.json"),
                Arc::new(TemplateResource),
            )
            .unwrap();
        registry
            .register(
                Resource::new("file:///users/admin.json"),
                Arc::new(StaticResource {
                    text: "static admin".to_string(),
                }),
            )
            .unwrap();

        let contents = registry
            .read("file:///users/admin.json", ctx())
            .await
            .unwrap();
        assert_eq!(text_of(&contents), "static admin");

        let contents = registry
            .read("file:///users/alice.json", ctx())
            .await
            .unwrap();
        assert_eq!(text_of(&contents), "user=alice");
    }

    #[tokio::test]
    async fn test_unknown_uri_not_found() {
        let registry = ResourceRegistry::new();
        let err = registry.read("file:///nope", ctx()).await.unwrap_err();
        assert!(matches!(err, McpError::ResourceNotFound(_)));
    }

    #[test]
    fn test_duplicate_uri_rejected() {
        let registry = ResourceRegistry::new();
        registry
            .register(
                Resource::new("file:///a"),
                Arc::new(StaticResource {
                    text: String::new(),
                }),
            )
            .unwrap();
        assert!(
            registry
                .register(
                    Resource::new("file:///a"),
                    Arc::new(StaticResource {
                        text: String::new(),
                    }),
                )
                .is_err()
        );
    }

    #[test]
    fn test_subscription_delivery_order_and_count() {
        let registry = ResourceRegistry::new();
        let delivered: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let delivered2 = delivered.clone();
        registry.set_update_callback(move |uri, subscriber| {
            delivered2
                .lock()
                .unwrap()
                .push((uri.to_string(), subscriber.to_string()));
        });

        registry.subscribe("file:///x", "session-a");
        registry.subscribe("file:///x", "session-b");
        // Duplicate subscribe is a no-op.
        registry.subscribe("file:///x", "session-a");

        assert_eq!(registry.notify_updated("file:///x"), 2);
        {
            let log = delivered.lock().unwrap();
            assert_eq!(
                *log,
                vec![
                    ("file:///x".to_string(), "session-a".to_string()),
                    ("file:///x".to_string(), "session-b".to_string()),
                ]
            );
        }

        registry.unsubscribe("file:///x", "session-a");
        assert_eq!(registry.notify_updated("file:///x"), 1);
        // Unsubscribe is idempotent.
        registry.unsubscribe("file:///x", "session-a");
        assert_eq!(registry.subscribers("file:///x"), vec!["session-b"]);
    }

    #[test]
    fn test_unsubscribe_all_clears_session() {
        let registry = ResourceRegistry::new();
        registry.subscribe("file:///x", "s1");
        registry.subscribe("file:///y", "s1");
        registry.subscribe("file:///y", "s2");
        registry.unsubscribe_all("s1");
        assert!(registry.subscribers("file:///x").is_empty());
        assert_eq!(registry.subscribers("file:///y"), vec!["s2"]);
    }

    #[test]
    fn test_notify_fires_for_templates_too() {
        let registry = ResourceRegistry::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        registry.set_notify_callback(move || {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        registry
            .register_template(
                ResourceTemplate::new("file:///d/{n}"),
                Arc::new(TemplateResource),
            )
            .unwrap();
        registry.unregister_template("file:///d/{n}");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
