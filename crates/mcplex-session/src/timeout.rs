//! Per-request deadlines.
//!
//! A deadline table plus a sweeper task that polls it. Whoever removes an
//! entry first (completion, cancellation, or the sweeper) wins the race;
//! the losers find nothing and do nothing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use mcplex_protocol::RequestId;
use tokio::task::JoinHandle;
use tracing::debug;

type ExpireFn = Box<dyn FnOnce() + Send>;

struct Deadline {
    at: Instant,
    on_expire: ExpireFn,
}

/// Deadline table for in-flight requests.
pub struct TimeoutManager {
    deadlines: Mutex<HashMap<RequestId, Deadline>>,
}

impl TimeoutManager {
    pub fn new() -> Self {
        Self {
            deadlines: Mutex::new(HashMap::new()),
        }
    }

    /// Arm a deadline for `id`. `on_expire` runs at most once, from the
    /// sweeper, and only if neither `cancel` nor completion got there first.
    pub fn set_timeout(
        &self,
        id: RequestId,
        duration: Duration,
        on_expire: impl FnOnce() + Send + 'static,
    ) {
        self.lock().insert(
            id,
            Deadline {
                at: Instant::now() + duration,
                on_expire: Box::new(on_expire),
            },
        );
    }

    /// Disarm a deadline. Idempotent; missing entries are fine.
    pub fn cancel(&self, id: &RequestId) -> bool {
        self.lock().remove(id).is_some()
    }

    /// Fire every deadline at or before `now`, returning the expired ids.
    /// Callbacks run outside the table lock.
    pub fn check_expired(&self, now: Instant) -> Vec<RequestId> {
        let expired: Vec<(RequestId, Deadline)> = {
            let mut table = self.lock();
            let ids: Vec<RequestId> = table
                .iter()
                .filter(|(_, d)| d.at <= now)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| table.remove(&id).map(|d| (id, d)))
                .collect()
        };

        let mut fired = Vec::with_capacity(expired.len());
        for (id, deadline) in expired {
            debug!(request_id = %id, "request deadline expired");
            (deadline.on_expire)();
            fired.push(id);
        }
        fired
    }

    pub fn armed_count(&self) -> usize {
        self.lock().len()
    }

    /// Spawn the sweeper task. It holds only a weak reference, so dropping
    /// the last strong handle stops the sweep.
    pub fn spawn_sweeper(manager: &Arc<Self>, cadence: Duration) -> JoinHandle<()> {
        let weak: Weak<Self> = Arc::downgrade(manager);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(cadence);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match weak.upgrade() {
                    Some(manager) => {
                        manager.check_expired(Instant::now());
                    }
                    None => break,
                }
            }
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, Deadline>> {
        self.deadlines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for TimeoutManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_expiry_fires_once() {
        let manager = TimeoutManager::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();

        let id = RequestId::Number(1);
        manager.set_timeout(id.clone(), Duration::from_millis(10), move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        });

        let later = Instant::now() + Duration::from_millis(50);
        assert_eq!(manager.check_expired(later), vec![id.clone()]);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        // Already drained.
        assert!(manager.check_expired(later + Duration::from_secs(1)).is_empty());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unexpired_deadline_untouched() {
        let manager = TimeoutManager::new();
        manager.set_timeout(RequestId::Number(1), Duration::from_secs(60), || {
            panic!("must not fire")
        });
        assert!(manager.check_expired(Instant::now()).is_empty());
        assert_eq!(manager.armed_count(), 1);
    }

    #[test]
    fn test_cancel_beats_expiry() {
        let manager = TimeoutManager::new();
        let id = RequestId::Number(2);
        manager.set_timeout(id.clone(), Duration::from_millis(1), || {
            panic!("cancelled deadline must not fire")
        });

        assert!(manager.cancel(&id));
        assert!(!manager.cancel(&id));
        assert!(
            manager
                .check_expired(Instant::now() + Duration::from_secs(1))
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_manager_dropped() {
        let manager = Arc::new(TimeoutManager::new());
        let handle = TimeoutManager::spawn_sweeper(&manager, Duration::from_millis(5));
        drop(manager);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("sweeper should exit")
            .expect("sweeper should not panic");
    }

    #[tokio::test]
    async fn test_sweeper_fires_expired_deadlines() {
        let manager = Arc::new(TimeoutManager::new());
        let _handle = TimeoutManager::spawn_sweeper(&manager, Duration::from_millis(5));

        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        manager.set_timeout(RequestId::Number(1), Duration::from_millis(10), move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
