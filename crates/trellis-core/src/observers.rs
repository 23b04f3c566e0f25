//! Synchronous observer registry.
//!
//! Observers are keyed by a [`SubscriptionId`] handed out at subscription
//! time and removed by that id. Delivery happens on the notifying thread, in
//! registration order, outside the registry lock, so an observer may
//! subscribe or unsubscribe from inside its own callback. A panicking
//! observer is logged and skipped; the remaining observers still receive the
//! event.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`ObserverRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

pub struct ObserverRegistry<T> {
    next_id: AtomicU64,
    observers: Mutex<BTreeMap<SubscriptionId, Observer<T>>>,
}

impl<T> Default for ObserverRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for ObserverRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .finish()
    }
}

impl<T> ObserverRegistry<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            observers: Mutex::new(BTreeMap::new()),
        }
    }

    /// Register a callback. Ids increase monotonically, so map order is
    /// registration order.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, Arc::new(observer));
        id
    }

    /// Remove a callback. Returns `false` if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Deliver `event` to every registered observer.
    pub fn notify(&self, event: &T) {
        let snapshot: Vec<(SubscriptionId, Observer<T>)> = self
            .lock()
            .iter()
            .map(|(id, observer)| (*id, Arc::clone(observer)))
            .collect();

        for (id, observer) in snapshot {
            if catch_unwind(AssertUnwindSafe(|| observer(event))).is_err() {
                tracing::warn!(subscription = %id, "observer panicked; continuing delivery");
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

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<SubscriptionId, Observer<T>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
