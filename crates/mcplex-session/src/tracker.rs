//! Request tracker: id allocation and the pending-request table.
//!
//! The tracker is the sole id authority for the session; callers never pick
//! their own ids. Every registered entry leaves the table through exactly
//! one of `complete`, `cancel`, or `expire`, and the per-exit counters let
//! tests assert the conservation property
//! `registered == completed + cancelled + timed_out + still_pending`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Instant;

use mcplex_protocol::{JsonRpcErrorObject, RequestId};
use serde_json::Value;

type SuccessFn = Box<dyn FnOnce(Value) + Send>;
type ErrorFn = Box<dyn FnOnce(JsonRpcErrorObject) + Send>;

/// Callbacks for one in-flight outbound request.
///
/// Owned by the tracker from `register_pending` until its single terminal
/// transition; whoever removes it fires exactly one of the two callbacks.
pub struct PendingRequest {
    on_success: SuccessFn,
    on_error: ErrorFn,
    created_at: Instant,
}

impl PendingRequest {
    pub fn new(
        on_success: impl FnOnce(Value) + Send + 'static,
        on_error: impl FnOnce(JsonRpcErrorObject) + Send + 'static,
    ) -> Self {
        Self {
            on_success: Box::new(on_success),
            on_error: Box::new(on_error),
            created_at: Instant::now(),
        }
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Fire the success callback, consuming the entry.
    pub fn succeed(self, result: Value) {
        (self.on_success)(result);
    }

    /// Fire the error callback, consuming the entry.
    pub fn fail(self, error: JsonRpcErrorObject) {
        (self.on_error)(error);
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// Counters for the tracker's lifecycle invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerStats {
    pub registered: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub timed_out: u64,
    pub pending: u64,
}

impl TrackerStats {
    /// `registered == completed + cancelled + timed_out + pending`
    pub fn is_conserved(&self) -> bool {
        self.registered == self.completed + self.cancelled + self.timed_out + self.pending
    }
}

/// Id allocation plus the pending table.
///
/// `next_id` is lock-free; the table sits behind a mutex held only for map
/// mutation. Callbacks are never invoked under the lock: removal returns
/// the entry and the caller fires it.
pub struct RequestTracker {
    next_id: AtomicI64,
    pending: Mutex<HashMap<RequestId, PendingRequest>>,
    registered: AtomicU64,
    completed: AtomicU64,
    cancelled: AtomicU64,
    timed_out: AtomicU64,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self {
            next_id: AtomicI64::new(1),
            pending: Mutex::new(HashMap::new()),
            registered: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            timed_out: AtomicU64::new(0),
        }
    }

    /// Allocate the next request id. Monotonically increasing, never null,
    /// never reused within the session.
    pub fn next_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Record callbacks for an id previously produced by [`next_id`].
    pub fn register_pending(&self, id: RequestId, pending: PendingRequest) {
        self.registered.fetch_add(1, Ordering::Relaxed);
        self.lock().insert(id, pending);
    }

    /// Atomically remove and return the entry for a completed request.
    ///
    /// Yields `None` when the id is unknown (a late response after cancel
    /// or timeout), in which case the caller discards the response.
    pub fn complete(&self, id: &RequestId) -> Option<PendingRequest> {
        let removed = self.lock().remove(id);
        if removed.is_some() {
            self.completed.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Remove an entry on the cancel path. The tracker fires nothing; the
    /// caller decides whether to drain the entry into a cancel error.
    pub fn cancel(&self, id: &RequestId) -> Option<PendingRequest> {
        let removed = self.lock().remove(id);
        if removed.is_some() {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Remove an entry whose deadline passed.
    pub fn expire(&self, id: &RequestId) -> Option<PendingRequest> {
        let removed = self.lock().remove(id);
        if removed.is_some() {
            self.timed_out.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    /// Drain every pending entry, for transport-close teardown.
    pub fn drain(&self) -> Vec<(RequestId, PendingRequest)> {
        let drained: Vec<_> = self.lock().drain().collect();
        self.completed
            .fetch_add(drained.len() as u64, Ordering::Relaxed);
        drained
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }

    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            registered: self.registered.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            pending: self.pending_count() as u64,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, PendingRequest>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn test_ids_are_monotonic_and_unique() {
        let tracker = RequestTracker::new();
        let a = tracker.next_id();
        let b = tracker.next_id();
        assert_eq!(a, RequestId::Number(1));
        assert_eq!(b, RequestId::Number(2));
    }

    #[test]
    fn test_complete_fires_success_exactly_once() {
        let tracker = RequestTracker::new();
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();

        let id = tracker.next_id();
        tracker.register_pending(
            id.clone(),
            PendingRequest::new(
                move |_| fired2.store(true, Ordering::SeqCst),
                |_| panic!("error callback must not fire"),
            ),
        );

        let entry = tracker.complete(&id).expect("entry present");
        entry.succeed(serde_json::json!({}));
        assert!(fired.load(Ordering::SeqCst));

        // Second completion finds nothing: the late response is discarded.
        assert!(tracker.complete(&id).is_none());
    }

    #[test]
    fn test_cancel_removes_without_firing() {
        let tracker = RequestTracker::new();
        let id = tracker.next_id();
        tracker.register_pending(
            id.clone(),
            PendingRequest::new(|_| panic!("no success"), |_| {}),
        );

        assert!(tracker.cancel(&id).is_some());
        assert_eq!(tracker.pending_count(), 0);
        assert!(tracker.complete(&id).is_none());
    }

    #[test]
    fn test_conservation_property() {
        let tracker = RequestTracker::new();
        let noop = || PendingRequest::new(|_| {}, |_| {});

        let ids: Vec<_> = (0..10)
            .map(|_| {
                let id = tracker.next_id();
                tracker.register_pending(id.clone(), noop());
                id
            })
            .collect();

        tracker.complete(&ids[0]);
        tracker.complete(&ids[1]);
        tracker.cancel(&ids[2]);
        tracker.expire(&ids[3]);

        let stats = tracker.stats();
        assert_eq!(stats.registered, 10);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.timed_out, 1);
        assert_eq!(stats.pending, 6);
        assert!(stats.is_conserved());
    }

    #[test]
    fn test_cancel_then_complete_is_noop() {
        let tracker = RequestTracker::new();
        let id = tracker.next_id();
        tracker.register_pending(id.clone(), PendingRequest::new(|_| {}, |_| {}));

        assert!(tracker.cancel(&id).is_some());
        assert!(tracker.cancel(&id).is_none());
        assert!(tracker.complete(&id).is_none());
        assert!(tracker.expire(&id).is_none());
        assert!(tracker.stats().is_conserved());
    }
}
