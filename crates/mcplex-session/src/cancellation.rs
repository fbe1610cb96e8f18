//! Cooperative cancellation: source/token pairs and the per-request table.
//!
//! The source is the authority that may request cancellation and is owned by
//! the table; tokens are freely cloneable observers. A request's pair moves
//! `Armed → Fired` on cancel or `Armed → Disarmed` on unregister. Both
//! transitions are terminal and both tolerate racing each other, which is
//! the entire race-safety contract: a cancel notification arriving after
//! the response is a logged no-op, never an error.

use std::collections::HashMap;
use std::sync::Mutex;

use mcplex_protocol::RequestId;
use tokio::sync::watch;
use tracing::debug;

/// The cancel authority for one request. Exclusively owned.
pub struct CancellationSource {
    tx: watch::Sender<bool>,
}

/// A cloneable, non-blocking view of a [`CancellationSource`].
#[derive(Clone)]
pub struct CancellationToken {
    rx: watch::Receiver<bool>,
    // Only set for detached tokens, which own their (never-fired) source.
    _keepalive: Option<std::sync::Arc<watch::Sender<bool>>>,
}

impl CancellationSource {
    pub fn new() -> (CancellationSource, CancellationToken) {
        let (tx, rx) = watch::channel(false);
        (
            CancellationSource { tx },
            CancellationToken {
                rx,
                _keepalive: None,
            },
        )
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            rx: self.tx.subscribe(),
            _keepalive: None,
        }
    }
}

impl CancellationToken {
    /// Non-blocking poll.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until cancellation is requested. Resolves immediately if the
    /// source already fired, or if the source was dropped.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        loop {
            if rx.changed().await.is_err() {
                return;
            }
            if *rx.borrow() {
                return;
            }
        }
    }

    /// A token that can never fire, for contexts with no cancel authority.
    pub fn detached() -> Self {
        let (tx, rx) = watch::channel(false);
        CancellationToken {
            rx,
            _keepalive: Some(std::sync::Arc::new(tx)),
        }
    }
}

/// Table of cancellation sources keyed by request id, one per direction of
/// a session.
pub struct CancellationManager {
    table: Mutex<HashMap<RequestId, CancellationSource>>,
}

impl CancellationManager {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Create and store a source for `id`, returning its token.
    pub fn register(&self, id: RequestId) -> CancellationToken {
        let (source, token) = CancellationSource::new();
        self.lock().insert(id, source);
        token
    }

    /// Fire and remove the source for `id`. Missing entries mean the request
    /// already completed; that race is tolerated silently.
    pub fn cancel(&self, id: &RequestId) -> bool {
        match self.lock().remove(id) {
            Some(source) => {
                source.cancel();
                true
            }
            None => {
                debug!(request_id = %id, "cancel for unknown request ignored");
                false
            }
        }
    }

    /// Remove the source without firing. Idempotent.
    pub fn unregister(&self, id: &RequestId) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn armed_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, CancellationSource>> {
        self.table
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for CancellationManager {
    fn default() -> Self {
        Self::new()
    }
}
