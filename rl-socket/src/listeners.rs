//! Type-keyed callback registry for inbound frames.
//!
//! Callbacks are registered under an exact message-type string or the
//! wildcard key. Registration returns a `Subscription`; dropping it (or
//! calling `unsubscribe`) removes the callback, and the last removal for a
//! type frees that bucket.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use rl_core::constants::WILDCARD_MESSAGE_TYPE;
use tracing::{debug, error};

/// Callback invoked with the parsed frame.
pub type Listener = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Unique handle for one registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct RegistryInner {
    next_id: AtomicU64,
    buckets: Mutex<HashMap<String, Vec<(ListenerId, Listener)>>>,
}

impl RegistryInner {
    fn buckets(&self) -> MutexGuard<'_, HashMap<String, Vec<(ListenerId, Listener)>>> {
        // Callbacks never run under this lock, so a poisoned guard only means a
        // panic during a map update; the map itself is still consistent.
        self.buckets.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remove(&self, message_type: &str, id: ListenerId) -> bool {
        let mut buckets = self.buckets();
        let Some(bucket) = buckets.get_mut(message_type) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|(existing, _)| *existing != id);
        let removed = bucket.len() != before;
        if bucket.is_empty() {
            buckets.remove(message_type);
        }
        removed
    }
}

/// Shared registry of frame listeners.
#[derive(Clone, Default)]
pub struct ListenerRegistry {
    inner: Arc<RegistryInner>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for frames whose `type` equals `message_type`.
    pub fn add<F>(&self, message_type: &str, callback: F) -> Subscription
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .buckets()
            .entry(message_type.to_string())
            .or_default()
            .push((id, Arc::new(callback)));
        debug!("listener {} added for {message_type}", id.0);

        Subscription {
            registry: Arc::downgrade(&self.inner),
            entries: vec![(message_type.to_string(), id)],
        }
    }

    /// Register `callback` for every frame.
    pub fn add_wildcard<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        self.add(WILDCARD_MESSAGE_TYPE, callback)
    }

    /// Remove one callback. Returns whether it was registered.
    pub fn remove(&self, message_type: &str, id: ListenerId) -> bool {
        self.inner.remove(message_type, id)
    }

    /// Number of callbacks registered for a type.
    pub fn count(&self, message_type: &str) -> usize {
        self.inner
            .buckets()
            .get(message_type)
            .map_or(0, |bucket| bucket.len())
    }

    /// Number of types with at least one callback.
    pub fn bucket_count(&self) -> usize {
        self.inner.buckets().len()
    }

    /// Invoke the callbacks for `message_type` and then the wildcard callbacks.
    ///
    /// Callbacks run outside the registry lock, so they may add or remove
    /// listeners. A panicking callback is logged and does not stop the others.
    /// Returns how many callbacks ran.
    pub fn dispatch(&self, message_type: Option<&str>, data: &serde_json::Value) -> usize {
        let targets: Vec<Listener> = {
            let buckets = self.inner.buckets();
            let typed = message_type
                .filter(|t| *t != WILDCARD_MESSAGE_TYPE)
                .and_then(|t| buckets.get(t))
                .into_iter()
                .flatten();
            let wildcard = buckets.get(WILDCARD_MESSAGE_TYPE).into_iter().flatten();
            typed.chain(wildcard).map(|(_, cb)| cb.clone()).collect()
        };

        for callback in &targets {
            if catch_unwind(AssertUnwindSafe(|| callback(data))).is_err() {
                error!(
                    "listener for {} panicked",
                    message_type.unwrap_or(WILDCARD_MESSAGE_TYPE)
                );
            }
        }
        targets.len()
    }
}

/// Handle to one or more registered callbacks.
///
/// Dropping the handle unsubscribes. Hold it for as long as the callback
/// should stay registered.
#[must_use = "dropping a Subscription removes its listener immediately"]
pub struct Subscription {
    registry: Weak<RegistryInner>,
    entries: Vec<(String, ListenerId)>,
}

impl Subscription {
    /// Combine several subscriptions into one handle.
    pub fn merge(subscriptions: Vec<Subscription>) -> Subscription {
        let mut registry = Weak::new();
        let mut entries = Vec::new();
        for mut sub in subscriptions {
            if registry.upgrade().is_none() {
                registry = sub.registry.clone();
            }
            entries.append(&mut sub.entries);
        }
        Subscription { registry, entries }
    }

    /// Ids of the callbacks this handle owns.
    pub fn ids(&self) -> Vec<ListenerId> {
        self.entries.iter().map(|(_, id)| *id).collect()
    }

    /// Remove the callbacks now.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            for (message_type, id) in self.entries.drain(..) {
                registry.remove(&message_type, id);
            }
        }
        self.entries.clear();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("entries", &self.entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&serde_json::Value) + Send + Sync + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move |_: &serde_json::Value| {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_multiple_callbacks_per_type() {
        let registry = ListenerRegistry::new();
        let (a, cb_a) = counter();
        let (b, cb_b) = counter();
        let _sa = registry.add("chat_message", cb_a);
        let _sb = registry.add("chat_message", cb_b);

        assert_eq!(registry.count("chat_message"), 2);
        let ran = registry.dispatch(Some("chat_message"), &serde_json::json!({}));
        assert_eq!(ran, 2);
        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wildcard_sees_every_type() {
        let registry = ListenerRegistry::new();
        let (typed, cb_typed) = counter();
        let (all, cb_all) = counter();
        let _s1 = registry.add("ride_status_update", cb_typed);
        let _s2 = registry.add_wildcard(cb_all);

        registry.dispatch(Some("ride_status_update"), &serde_json::json!({}));
        registry.dispatch(Some("promo_banner"), &serde_json::json!({}));
        registry.dispatch(None, &serde_json::json!({}));

        assert_eq!(typed.load(Ordering::SeqCst), 1);
        assert_eq!(all.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_last_unsubscribe_frees_bucket() {
        let registry = ListenerRegistry::new();
        let (_, cb1) = counter();
        let (_, cb2) = counter();
        let s1 = registry.add("driver_gps", cb1);
        let s2 = registry.add("driver_gps", cb2);
        assert_eq!(registry.bucket_count(), 1);

        s1.unsubscribe();
        assert_eq!(registry.count("driver_gps"), 1);
        drop(s2);
        assert_eq!(registry.count("driver_gps"), 0);
        assert_eq!(registry.bucket_count(), 0);
    }

    #[test]
    fn test_remove_by_id() {
        let registry = ListenerRegistry::new();
        let (count, cb) = counter();
        let sub = registry.add("chat_message", cb);
        let id = sub.ids()[0];

        assert!(registry.remove("chat_message", id));
        assert!(!registry.remove("chat_message", id));
        registry.dispatch(Some("chat_message"), &serde_json::json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 0);
        drop(sub);
    }

    #[test]
    fn test_merged_subscription_removes_all() {
        let registry = ListenerRegistry::new();
        let (_, cb1) = counter();
        let (_, cb2) = counter();
        let merged = Subscription::merge(vec![
            registry.add("ride_status_update", cb1),
            registry.add("ride_cancellation", cb2),
        ]);
        assert_eq!(merged.ids().len(), 2);
        assert_eq!(registry.bucket_count(), 2);

        merged.unsubscribe();
        assert_eq!(registry.bucket_count(), 0);
    }

    #[test]
    fn test_panicking_listener_does_not_stop_others() {
        let registry = ListenerRegistry::new();
        let (count, cb) = counter();
        let _bad = registry.add("chat_message", |_: &serde_json::Value| panic!("boom"));
        let _good = registry.add("chat_message", cb);

        registry.dispatch(Some("chat_message"), &serde_json::json!({}));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_subscription_outliving_registry() {
        let registry = ListenerRegistry::new();
        let (_, cb) = counter();
        let sub = registry.add("chat_message", cb);
        drop(registry);
        sub.unsubscribe();
    }
}
