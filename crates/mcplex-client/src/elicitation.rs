//! The elicitation engine: synchronous forms, out-of-band URLs.
//!
//! Form mode resolves in one round trip through the host's handler. URL
//! mode returns the handler's provisional acknowledgment and parks a
//! completion entry keyed by `elicitation_id`; the later
//! `notifications/elicitation/complete` fires it. Late or duplicate
//! completions find no entry and are ignored.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mcplex_protocol::elicitation::{ElicitCreateParams, ElicitResult};
use mcplex_protocol::notifications::ElicitationCompleteParams;
use mcplex_protocol::{McpError, McpResult};
use tracing::debug;

/// The host side of elicitation: render the form (or open the URL) and
/// report what the user did.
#[async_trait]
pub trait ElicitationHandler: Send + Sync {
    /// Form mode: collect input and return the final result.
    /// URL mode: open the URL and return a provisional acknowledgment
    /// (`ElicitResult::accepted()` is the conventional shape).
    async fn elicit(&self, request: ElicitCreateParams) -> McpResult<ElicitResult>;

    /// Invoked when a URL-mode elicitation completes out of band, unless a
    /// custom completion was registered for that id.
    async fn on_url_complete(&self, elicitation_id: &str, result: ElicitResult) {
        let _ = (elicitation_id, result);
    }
}

type CompletionFn = Box<dyn FnOnce(ElicitResult) + Send>;

/// Routes `elicitation/create` requests and correlates URL-mode
/// completions.
pub struct ElicitationEngine {
    handler: Arc<dyn ElicitationHandler>,
    pending: Mutex<HashMap<String, CompletionFn>>,
}

impl ElicitationEngine {
    pub fn new(handler: Arc<dyn ElicitationHandler>) -> Self {
        Self {
            handler,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Handle one `elicitation/create` request.
    pub async fn handle_create(&self, params: ElicitCreateParams) -> McpResult<ElicitResult> {
        match &params {
            ElicitCreateParams::Form { .. } => self.handler.elicit(params).await,
            ElicitCreateParams::Url { elicitation_id, .. } => {
                let id = elicitation_id.clone();
                let ack = self.handler.elicit(params).await?;
                // Park the completion unless the host already registered its
                // own callback for this id.
                let mut pending = self.lock();
                if !pending.contains_key(&id) {
                    let handler = self.handler.clone();
                    let complete_id = id.clone();
                    pending.insert(
                        id,
                        Box::new(move |result| {
                            tokio::spawn(async move {
                                handler.on_url_complete(&complete_id, result).await;
                            });
                        }),
                    );
                }
                Ok(ack)
            }
        }
    }

    /// Register a custom completion for an `elicitation_id` the host knows
    /// is coming. Fails if one is already parked.
    pub fn register_completion(
        &self,
        elicitation_id: impl Into<String>,
        completion: impl FnOnce(ElicitResult) + Send + 'static,
    ) -> McpResult<()> {
        let id = elicitation_id.into();
        let mut pending = self.lock();
        if pending.contains_key(&id) {
            return Err(McpError::ElicitationError(format!(
                "completion already registered for '{id}'"
            )));
        }
        pending.insert(id, Box::new(completion));
        Ok(())
    }

    /// Route a `notifications/elicitation/complete`. Unknown ids (late or
    /// duplicate notifications) are ignored.
    pub fn handle_complete(&self, params: ElicitationCompleteParams) {
        let completion = self.lock().remove(&params.elicitation_id);
        match completion {
            Some(completion) => completion(ElicitResult {
                action: params.action,
                content: params.content,
            }),
            None => {
                debug!(
                    elicitation_id = %params.elicitation_id,
                    "elicitation completion with no pending entry ignored"
                );
            }
        }
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CompletionFn>> {
        self.pending.lock().unwrap_or_else(|p| p.into_inner())
    }
}
