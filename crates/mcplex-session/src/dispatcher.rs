//! Inbound message routing.
//!
//! One dispatcher per session. Requests fan out into their own tasks so a
//! slow handler never stalls the read loop; notifications and response
//! completions run inline on the reader to preserve arrival order.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mcplex_protocol::notifications::CancelledParams;
use mcplex_protocol::{
    JsonRpcErrorObject, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    McpResult, ResponsePayload, methods, parse_message,
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cancellation::CancellationManager;
use crate::context::{RequestContext, progress_token_of};
use crate::outbound::Outbound;
use crate::session::InitializeGate;
use crate::timeout::TimeoutManager;
use crate::tracker::RequestTracker;

/// Handles one request method. Returns domain errors; the dispatcher owns
/// the conversion to protocol error objects.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, params: Option<Value>, ctx: RequestContext) -> McpResult<Value>;
}

/// Handles one notification method. No response, no error channel.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, params: Option<Value>);
}

/// Method-to-handler bindings. Populated during session construction and
/// immutable for the session's lifetime, so lookups need no lock.
#[derive(Default)]
pub struct HandlerRegistry {
    requests: HashMap<String, Arc<dyn RequestHandler>>,
    notifications: HashMap<String, Arc<dyn NotificationHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_request(&mut self, method: impl Into<String>, handler: Arc<dyn RequestHandler>) {
        self.requests.insert(method.into(), handler);
    }

    pub fn register_notification(
        &mut self,
        method: impl Into<String>,
        handler: Arc<dyn NotificationHandler>,
    ) {
        self.notifications.insert(method.into(), handler);
    }

    pub fn request_handler(&self, method: &str) -> Option<Arc<dyn RequestHandler>> {
        self.requests.get(method).cloned()
    }

    pub fn notification_handler(&self, method: &str) -> Option<Arc<dyn NotificationHandler>> {
        self.notifications.get(method).cloned()
    }

    pub fn request_methods(&self) -> Vec<String> {
        self.requests.keys().cloned().collect()
    }
}

/// Routes each inbound message to a request handler, a notification
/// handler, or the tracker's pending-completion path.
#[derive(Clone)]
pub struct Dispatcher {
    handlers: Arc<HandlerRegistry>,
    tracker: Arc<RequestTracker>,
    timeouts: Arc<TimeoutManager>,
    outbound_cancels: Arc<CancellationManager>,
    inflight: Arc<CancellationManager>,
    outbound: Outbound,
    gate: Arc<InitializeGate>,
}

impl Dispatcher {
    pub(crate) fn new(
        handlers: Arc<HandlerRegistry>,
        tracker: Arc<RequestTracker>,
        timeouts: Arc<TimeoutManager>,
        outbound_cancels: Arc<CancellationManager>,
        inflight: Arc<CancellationManager>,
        outbound: Outbound,
        gate: Arc<InitializeGate>,
    ) -> Self {
        Self {
            handlers,
            tracker,
            timeouts,
            outbound_cancels,
            inflight,
            outbound,
            gate,
        }
    }

    /// Process one framed inbound message.
    pub async fn dispatch_line(&self, raw: &str) {
        match parse_message(raw) {
            Ok(JsonRpcMessage::Request(request)) => self.dispatch_request(request),
            Ok(JsonRpcMessage::Notification(notification)) => {
                self.dispatch_notification(notification).await;
            }
            Ok(JsonRpcMessage::Response(response)) => self.dispatch_response(response),
            Err(failure) => {
                warn!(
                    code = failure.error.code,
                    id = %failure.id,
                    "rejecting undecodable message"
                );
                self.outbound
                    .send(JsonRpcMessage::Response(failure.into_response()));
            }
        }
    }

    fn dispatch_request(&self, request: JsonRpcRequest) {
        let JsonRpcRequest {
            id, method, params, ..
        } = request;

        if !self.gate.is_ready()
            && method != methods::INITIALIZE
            && method != methods::PING
        {
            self.outbound.respond_err(
                id,
                JsonRpcErrorObject::invalid_request(Some(format!(
                    "received '{method}' before initialize completed"
                ))),
            );
            return;
        }

        let Some(handler) = self.handlers.request_handler(&method) else {
            self.outbound
                .respond_err(id, JsonRpcErrorObject::method_not_found(&method));
            return;
        };

        let token = self.inflight.register(id.clone());
        let ctx = RequestContext::new(
            id.clone(),
            token,
            progress_token_of(params.as_ref()),
            self.outbound.clone(),
        );

        let inflight = self.inflight.clone();
        let outbound = self.outbound.clone();
        tokio::spawn(async move {
            debug!(request_id = %id, method = %method, "handling request");
            let result = handler.handle(params, ctx).await;
            inflight.unregister(&id);
            match result {
                Ok(value) => match promoted_error(&value) {
                    Some(error) => outbound.respond_err(id, error),
                    None => outbound.respond_ok(id, value),
                },
                Err(e) => outbound.respond_err(id, e.to_error_object()),
            }
        });
    }

    async fn dispatch_notification(&self, notification: JsonRpcNotification) {
        if notification.method == methods::NOTIFICATION_CANCELLED {
            self.handle_cancelled(notification.params.as_ref());
            return;
        }

        match self.handlers.notification_handler(&notification.method) {
            Some(handler) => handler.handle(notification.params).await,
            None => debug!(method = %notification.method, "unhandled notification ignored"),
        }
    }

    /// The peer is cancelling a request it sent us. A missing entry means
    /// the request already completed; the race is tolerated silently.
    fn handle_cancelled(&self, params: Option<&Value>) {
        let parsed: Option<CancelledParams> = params
            .cloned()
            .and_then(|p| serde_json::from_value(p).ok());
        match parsed {
            Some(cancelled) => {
                debug!(
                    request_id = %cancelled.request_id,
                    reason = cancelled.reason.as_deref().unwrap_or(""),
                    "peer cancelled in-flight request"
                );
                self.inflight.cancel(&cancelled.request_id);
            }
            None => debug!("cancelled notification with undecodable params ignored"),
        }
    }

    /// A response to one of our own requests: drain the pending entry and
    /// fire the matching callback. Completion, timeout, and cancel race for
    /// the same entry; whichever removed it first already won.
    fn dispatch_response(&self, response: JsonRpcResponse) {
        let id = response.id.clone();
        let Some(pending) = self.tracker.complete(&id) else {
            debug!(request_id = %id, "discarding response for unknown request");
            return;
        };
        self.timeouts.cancel(&id);
        self.outbound_cancels.unregister(&id);
        match response.payload {
            ResponsePayload::Success { result } => pending.succeed(result),
            ResponsePayload::Error { error } => pending.fail(error),
        }
    }

    pub(crate) fn tracker(&self) -> &Arc<RequestTracker> {
        &self.tracker
    }
}

/// Promote a top-level `error` key in a handler result into a protocol
/// error at the same request id.
fn promoted_error(value: &Value) -> Option<JsonRpcErrorObject> {
    let error_value = value.as_object()?.get("error")?;
    match serde_json::from_value::<JsonRpcErrorObject>(error_value.clone()) {
        Ok(error) => Some(error),
        Err(_) => Some(JsonRpcErrorObject::new(
            mcplex_protocol::error_codes::INTERNAL_ERROR,
            "handler reported an error",
            Some(error_value.clone()),
        )),
    }
}
