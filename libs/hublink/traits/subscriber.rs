use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Callback stored by the registry.
pub type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Handle returned by [`SubscriberRegistry::subscribe`], used for removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    name: String,
    id: u64,
}

impl Subscription {
    /// The event name this subscription listens on.
    pub fn event_name(&self) -> &str {
        &self.name
    }
}

/// Event name → ordered callback sequence.
///
/// Callbacks fire in registration order, synchronously with respect to
/// the event that triggered them. The callback list is snapshotted before
/// firing, so a callback may subscribe or unsubscribe without deadlocking;
/// such changes take effect from the next emission.
pub struct SubscriberRegistry<E> {
    subscribers: RwLock<HashMap<String, Vec<(u64, Callback<E>)>>>,
    next_id: AtomicU64,
}

impl<E> SubscriberRegistry<E> {
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Register a callback for `name`; fires after all earlier
    /// registrations for the same name.
    pub fn subscribe(
        &self,
        name: impl Into<String>,
        callback: impl Fn(&E) + Send + Sync + 'static,
    ) -> Subscription {
        let name = name.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .write()
            .entry(name.clone())
            .or_default()
            .push((id, Arc::new(callback)));
        Subscription { name, id }
    }

    /// Remove a subscription. Returns whether it was still registered.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        let mut subscribers = self.subscribers.write();
        let Some(list) = subscribers.get_mut(&subscription.name) else {
            return false;
        };
        let before = list.len();
        list.retain(|(id, _)| *id != subscription.id);
        before != list.len()
    }

    /// Fire all callbacks registered for `name`, in registration order.
    pub fn emit(&self, name: &str, event: &E) {
        let callbacks: Vec<Callback<E>> = match self.subscribers.read().get(name) {
            Some(list) => list.iter().map(|(_, callback)| Arc::clone(callback)).collect(),
            None => return,
        };
        for callback in callbacks {
            callback(event);
        }
    }

    /// Number of callbacks currently registered for `name`.
    pub fn subscriber_count(&self, name: &str) -> usize {
        self.subscribers.read().get(name).map_or(0, Vec::len)
    }
}

impl<E> Default for SubscriberRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
