//! Future adapter over the callback core.
//!
//! Each call allocates a single-use oneshot pair and wraps it into the
//! success/error callbacks. The sender sits behind a shared `take()` guard:
//! only the first callback to fire gets it, the second finds the slot empty
//! and is a no-op. That guard is what makes at-most-once completion hold
//! even if tracker discipline were ever violated upstream.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mcplex_protocol::{JsonRpcErrorObject, RequestId};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::SessionError;
use crate::cancellation::CancellationToken;
use crate::session::Session;

type Completion = Result<Value, JsonRpcErrorObject>;
type SharedSender = Arc<Mutex<Option<oneshot::Sender<Completion>>>>;

fn completion_pair() -> (SharedSender, oneshot::Receiver<Completion>) {
    let (tx, rx) = oneshot::channel();
    (Arc::new(Mutex::new(Some(tx))), rx)
}

fn complete(slot: &SharedSender, outcome: Completion) {
    let sender = slot
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take();
    if let Some(sender) = sender {
        let _ = sender.send(outcome);
    }
}

/// A request in flight through the adapter: the awaitable plus the id and
/// cancellation token, so callers can cancel mid-wait.
pub struct InflightRequest {
    id: RequestId,
    token: CancellationToken,
    rx: oneshot::Receiver<Completion>,
    timeout: Duration,
}

impl InflightRequest {
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Wait for whichever completion fires first. The wait bound is a local
    /// backstop over the tracker's own deadline, which normally fires first
    /// with a −32001 error.
    pub async fn wait(self) -> Result<Value, SessionError> {
        match tokio::time::timeout(self.timeout, self.rx).await {
            Ok(Ok(Ok(result))) => Ok(result),
            Ok(Ok(Err(error))) => Err(SessionError::Rpc(error)),
            Ok(Err(_)) => Err(SessionError::Closed),
            Err(_) => Err(SessionError::Timeout(self.timeout)),
        }
    }
}

impl Session {
    /// Start a request and return the in-flight handle.
    pub fn start_request(&self, method: &str, params: Option<Value>) -> InflightRequest {
        self.start_request_with_timeout(method, params, self.config().request_timeout)
    }

    pub fn start_request_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> InflightRequest {
        let (slot, rx) = completion_pair();
        let success_slot = slot.clone();
        let error_slot = slot;
        let (id, token) = self.send_request_with_callbacks(
            method,
            params,
            Some(timeout),
            move |result| complete(&success_slot, Ok(result)),
            move |error| complete(&error_slot, Err(error)),
        );
        InflightRequest {
            id,
            token,
            rx,
            // Local wait slightly outlasts the tracker deadline so the
            // typed -32001 error wins over the bare wait timeout.
            timeout: timeout + Duration::from_secs(1),
        }
    }

    /// Send a request and wait for its result with the session's default
    /// timeout.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, SessionError> {
        self.start_request(method, params).wait().await
    }

    /// Send a request and wait with an explicit timeout.
    pub async fn request_with_timeout(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, SessionError> {
        self.start_request_with_timeout(method, params, timeout)
            .wait()
            .await
    }
}
