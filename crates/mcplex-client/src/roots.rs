//! Advertised file roots.

use std::sync::{Arc, Mutex, RwLock};

use mcplex_protocol::McpResult;
use mcplex_protocol::roots::Root;

type NotifyFn = Arc<dyn Fn() + Send + Sync>;

/// The ordered root list a client advertises.
///
/// `set_roots` replaces atomically but deliberately does not notify; hosts
/// batch changes and call [`RootsManager::notify_changed`] when done.
pub struct RootsManager {
    roots: RwLock<Vec<Root>>,
    notify: Mutex<Option<NotifyFn>>,
}

impl RootsManager {
    pub fn new() -> Self {
        Self {
            roots: RwLock::new(Vec::new()),
            notify: Mutex::new(None),
        }
    }

    /// Replace the root list. Every entry is validated first; any invalid
    /// URI rejects the whole set and leaves the prior list intact.
    pub fn set_roots(&self, new_roots: Vec<Root>) -> McpResult<()> {
        for root in &new_roots {
            root.validate()?;
        }
        *self.roots.write().unwrap_or_else(|p| p.into_inner()) = new_roots;
        Ok(())
    }

    pub fn roots(&self) -> Vec<Root> {
        self.roots
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    /// Fire the configured callback, which the owning session wires to emit
    /// `notifications/roots/list_changed`.
    pub fn notify_changed(&self) {
        let callback = self
            .notify
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    pub fn set_notify_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.notify.lock().unwrap_or_else(|p| p.into_inner()) = Some(Arc::new(callback));
    }
}

impl Default for RootsManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_set_roots_validates_all() {
        let manager = RootsManager::new();
        manager
            .set_roots(vec![Root::new("file:///a"), Root::new("file:///b")])
            .unwrap();
        assert_eq!(manager.roots().len(), 2);
    }

    #[test]
    fn test_invalid_root_leaves_prior_state() {
        let manager = RootsManager::new();
        manager.set_roots(vec![Root::new("file:///a")]).unwrap();

        let err = manager.set_roots(vec![
            Root::new("file:///b"),
            Root::new("https://not-a-file"),
        ]);
        assert!(err.is_err());
        // The failed replacement touched nothing.
        assert_eq!(manager.roots(), vec![Root::new("file:///a")]);
    }

    #[test]
    fn test_set_roots_does_not_auto_notify() {
        let manager = RootsManager::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired2 = fired.clone();
        manager.set_notify_callback(move || {
            fired2.fetch_add(1, Ordering::SeqCst);
        });

        manager.set_roots(vec![Root::new("file:///a")]).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        manager.notify_changed();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
