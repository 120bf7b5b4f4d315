// src/async_actors/connection/listeners.rs

// 🌍 Standard library
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

// 📦 External crates
use serde_json::Value;
use tracing::{debug, error};

pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Callbacks that see every inbound message, in registration order.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
}

impl ListenerRegistry {
    pub fn register(self: &Arc<Self>, listener: Listener) -> ListenerHandle {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, listener));
        debug!(listener_id = id.0, "Listener registered");
        ListenerHandle {
            id,
            registry: Arc::downgrade(self),
        }
    }

    /// Returns `false` if the listener was already gone.
    pub fn unregister(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        let removed = listeners.len() != before;
        if removed {
            debug!(listener_id = id.0, "Listener unregistered");
        }
        removed
    }

    /// Invokes every listener with `message`. A panicking listener is logged
    /// and skipped; the rest still run.
    pub fn dispatch(&self, message: &Value) {
        // Snapshot so listeners may (un)register without deadlocking.
        let snapshot: Vec<(ListenerId, Listener)> = self.lock().clone();
        for (id, listener) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(message))).is_err() {
                error!(listener_id = id.0, "❌ Listener panicked while handling message");
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ListenerId, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes exactly one listener. Safe to call more than once and after the
/// registry itself is gone.
#[derive(Debug, Clone)]
pub struct ListenerHandle {
    id: ListenerId,
    registry: Weak<ListenerRegistry>,
}

impl ListenerHandle {
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub fn unregister(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.unregister(self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    fn counting_listener(counter: &Arc<AtomicUsize>) -> Listener {
        let counter = Arc::clone(counter);
        Arc::new(move |_message: &Value| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn unregistered_listener_receives_nothing() {
        let registry = Arc::new(ListenerRegistry::default());
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let handle = registry.register(counting_listener(&first));
        registry.register(counting_listener(&second));
        registry.dispatch(&json!({ "msg_type": "tick" }));

        assert!(handle.unregister());
        registry.dispatch(&json!({ "msg_type": "tick" }));

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unregister_is_idempotent() {
        let registry = Arc::new(ListenerRegistry::default());
        let handle = registry.register(Arc::new(|_: &Value| {}));

        assert!(handle.unregister());
        assert!(!handle.unregister());
        assert!(registry.is_empty());

        drop(registry);
        assert!(!handle.unregister());
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let registry = Arc::new(ListenerRegistry::default());
        let after = Arc::new(AtomicUsize::new(0));

        registry.register(Arc::new(|_: &Value| panic!("listener failure")));
        registry.register(counting_listener(&after));
        registry.dispatch(&json!({}));
        registry.dispatch(&json!({}));

        assert_eq!(after.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn delivery_follows_registration_order() {
        let registry = Arc::new(ListenerRegistry::default());
        let seen = Arc::new(Mutex::new(Vec::new()));

        for label in ["a", "b", "c"] {
            let seen = Arc::clone(&seen);
            registry.register(Arc::new(move |_: &Value| seen.lock().unwrap().push(label)));
        }
        registry.dispatch(&json!({}));

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn listener_may_unregister_itself_during_dispatch() {
        let registry = Arc::new(ListenerRegistry::default());
        let slot: Arc<Mutex<Option<ListenerHandle>>> = Arc::new(Mutex::new(None));

        let inner = Arc::clone(&slot);
        let handle = registry.register(Arc::new(move |_: &Value| {
            if let Some(handle) = inner.lock().unwrap().as_ref() {
                handle.unregister();
            }
        }));
        *slot.lock().unwrap() = Some(handle);

        registry.dispatch(&json!({}));
        assert!(registry.is_empty());
    }
}
