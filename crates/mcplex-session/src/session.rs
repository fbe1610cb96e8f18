//! The session: one MCP peer over one transport.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use mcplex_protocol::notifications::CancelledParams;
use mcplex_protocol::{
    JsonRpcErrorObject, JsonRpcMessage, JsonRpcRequest, RequestId, methods,
};
use mcplex_transport::Transport;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cancellation::{CancellationManager, CancellationToken};
use crate::dispatcher::{Dispatcher, HandlerRegistry};
use crate::outbound::Outbound;
use crate::timeout::TimeoutManager;
use crate::tracker::{PendingRequest, RequestTracker, TrackerStats};

/// Whether the initialize handshake has completed.
///
/// Until it flips, inbound requests other than `initialize` and `ping` are
/// rejected with invalid-request. The server's initialize handler marks it;
/// a client marks it after the initialize result arrives.
pub struct InitializeGate {
    ready: AtomicBool,
}

impl InitializeGate {
    pub fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
        }
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

impl Default for InitializeGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Tunables for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Default wait bound for the request adapter.
    pub request_timeout: Duration,
    /// Cadence of the timeout sweeper.
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            sweep_interval: Duration::from_millis(100),
        }
    }
}

/// A running MCP session.
///
/// Owns the tracker, timeout manager, and cancellation tables, plus the
/// writer and reader tasks moving messages through the transport. Dropping
/// the session aborts its tasks.
pub struct Session {
    outbound: Outbound,
    tracker: Arc<RequestTracker>,
    timeouts: Arc<TimeoutManager>,
    outbound_cancels: Arc<CancellationManager>,
    gate: Arc<InitializeGate>,
    config: SessionConfig,
    closed_rx: watch::Receiver<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Cloneable handle into the outbound FIFO.
    pub fn outbound(&self) -> Outbound {
        self.outbound.clone()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Flip the initialize gate open. Client sessions call this once the
    /// initialize result has been validated.
    pub fn mark_initialized(&self) {
        self.gate.mark_ready();
    }

    pub fn is_initialized(&self) -> bool {
        self.gate.is_ready()
    }

    /// Send a request, completing through the given callbacks.
    ///
    /// The library allocates the id; the returned token observes local
    /// cancellation of this request. Exactly one of the callbacks fires,
    /// whether from the response, the timeout, or the cancel path, and never
    /// more than once.
    pub fn send_request_with_callbacks(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Option<Duration>,
        on_success: impl FnOnce(Value) + Send + 'static,
        on_error: impl FnOnce(JsonRpcErrorObject) + Send + 'static,
    ) -> (RequestId, CancellationToken) {
        let id = self.tracker.next_id();
        let token = self.outbound_cancels.register(id.clone());
        self.tracker
            .register_pending(id.clone(), PendingRequest::new(on_success, on_error));

        // Arm the deadline after registration so an instant expiry still
        // finds the entry; whoever removes it first wins.
        let deadline = timeout.unwrap_or(self.config.request_timeout);
        let tracker = self.tracker.clone();
        let cancels = self.outbound_cancels.clone();
        let expire_id = id.clone();
        self.timeouts.set_timeout(id.clone(), deadline, move || {
            if let Some(pending) = tracker.expire(&expire_id) {
                cancels.unregister(&expire_id);
                pending.fail(JsonRpcErrorObject::request_timeout());
            }
        });

        self.outbound.send(JsonRpcMessage::Request(JsonRpcRequest::new(
            id.clone(),
            method,
            params,
        )));
        (id, token)
    }

    /// Send a notification.
    pub fn notify(&self, method: &str, params: Option<Value>) {
        self.outbound.notify(method, params);
    }

    /// Cancel one of our own in-flight requests.
    ///
    /// Best-effort: the pending entry is drained into a cancel error, the
    /// local token fires, and `notifications/cancelled` goes to the peer,
    /// which may already have a response on the wire. Both sides tolerate
    /// losing that race.
    pub fn cancel_request(&self, id: &RequestId, reason: Option<&str>) {
        self.timeouts.cancel(id);
        self.outbound_cancels.cancel(id);
        if let Some(pending) = self.tracker.cancel(id) {
            pending.fail(JsonRpcErrorObject::request_cancelled(
                reason.map(String::from),
            ));
        }
        let params = CancelledParams {
            request_id: id.clone(),
            reason: reason.map(String::from),
        };
        if let Ok(value) = serde_json::to_value(&params) {
            self.outbound
                .notify(methods::NOTIFICATION_CANCELLED, Some(value));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.tracker.pending_count()
    }

    pub fn tracker_stats(&self) -> TrackerStats {
        self.tracker.stats()
    }

    /// True once the transport has closed in either direction.
    pub fn is_closed(&self) -> bool {
        *self.closed_rx.borrow()
    }

    /// Wait for the transport to close.
    pub async fn closed(&self) {
        let mut rx = self.closed_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Builds a [`Session`]: handler bindings first, then a transport.
pub struct SessionBuilder {
    handlers: HandlerRegistry,
    config: SessionConfig,
    gate: Option<Arc<InitializeGate>>,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            handlers: HandlerRegistry::new(),
            config: SessionConfig::default(),
            gate: None,
        }
    }

    pub fn with_handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an externally-created gate, so role builders can hand it to
    /// their initialize handler before the session exists.
    pub fn with_gate(mut self, gate: Arc<InitializeGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Spawn the session over a transport.
    pub fn build(self, transport: Transport) -> Arc<Session> {
        let (mut sender, mut receiver) = transport.into_split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<JsonRpcMessage>();
        let (closed_tx, closed_rx) = watch::channel(false);

        let outbound = Outbound::new(out_tx);
        let tracker = Arc::new(RequestTracker::new());
        let timeouts = Arc::new(TimeoutManager::new());
        let outbound_cancels = Arc::new(CancellationManager::new());
        let inflight = Arc::new(CancellationManager::new());
        let gate = self.gate.unwrap_or_else(|| Arc::new(InitializeGate::new()));

        let dispatcher = Dispatcher::new(
            Arc::new(self.handlers),
            tracker.clone(),
            timeouts.clone(),
            outbound_cancels.clone(),
            inflight,
            outbound.clone(),
            gate.clone(),
        );

        // Writer: drain the FIFO into the transport, one frame per message.
        let writer = tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                let wire = match message.to_wire() {
                    Ok(wire) => wire,
                    Err(e) => {
                        warn!(error = %e, "dropping unserializable outbound message");
                        continue;
                    }
                };
                if let Err(e) = sender.send(&wire).await {
                    warn!(error = %e, "transport write failed, stopping writer");
                    break;
                }
            }
        });

        // Reader: feed inbound frames through the dispatcher until EOF,
        // then drain every still-pending request with a closed error.
        let reader_dispatcher = dispatcher.clone();
        let reader = tokio::spawn(async move {
            loop {
                match receiver.receive().await {
                    Ok(Some(line)) => reader_dispatcher.dispatch_line(&line).await,
                    Ok(None) => {
                        info!("transport closed");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "transport read failed");
                        break;
                    }
                }
            }
            for (id, pending) in reader_dispatcher.tracker().drain() {
                debug!(request_id = %id, "failing pending request: session closed");
                pending.fail(JsonRpcErrorObject::internal_error(Some(
                    "session closed".to_string(),
                )));
            }
            let _ = closed_tx.send(true);
        });

        let sweeper = TimeoutManager::spawn_sweeper(&timeouts, self.config.sweep_interval);

        Arc::new(Session {
            outbound,
            tracker,
            timeouts,
            outbound_cancels,
            gate,
            config: self.config,
            closed_rx,
            tasks: vec![writer, reader, sweeper],
        })
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
