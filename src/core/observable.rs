//! Named-attribute change notifications.
//!
//! [`PropertyChanged`] is a narrow in-process publish/subscribe hub. Owners call
//! [`PropertyChanged::notify`] explicitly at every state transition; observers
//! (usually a UI layer) subscribe to the attributes they render.
//!
//! # Invariants
//!
//! 1. Callbacks for an attribute run in subscription order.
//! 2. A panicking callback is logged and skipped; the remaining callbacks still run.
//! 3. No internal lock is held while callbacks run, so a callback may subscribe,
//!    unsubscribe or query its owner.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::warn;

type Callback = Arc<dyn Fn(&str) + Send + Sync>;

/// Identifies one subscription on a [`PropertyChanged`] hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

struct Listener {
    handle: SubscriptionHandle,
    /// `None` listens to every attribute.
    attribute: Option<String>,
    callback: Callback,
}

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<Listener>,
}

/// Property-change notification hub.
///
/// Clones share the same listener set.
#[derive(Clone, Default)]
pub struct PropertyChanged {
    listeners: Arc<Mutex<Listeners>>,
}

impl PropertyChanged {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `callback` whenever `attribute` is notified.
    pub fn subscribe(
        &self,
        attribute: impl Into<String>,
        callback: impl Fn(&str) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.insert(Some(attribute.into()), Arc::new(callback))
    }

    /// Call `callback` for every notified attribute.
    pub fn subscribe_all(
        &self,
        callback: impl Fn(&str) + Send + Sync + 'static,
    ) -> SubscriptionHandle {
        self.insert(None, Arc::new(callback))
    }

    /// Like [`subscribe`](Self::subscribe), but the subscription ends when the
    /// returned guard is dropped.
    pub fn subscribe_scoped(
        &self,
        attribute: impl Into<String>,
        callback: impl Fn(&str) + Send + Sync + 'static,
    ) -> Subscription {
        let handle = self.subscribe(attribute, callback);
        Subscription {
            listeners: Arc::downgrade(&self.listeners),
            handle,
        }
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, handle: SubscriptionHandle) -> bool {
        remove(&mut self.lock(), handle)
    }

    /// Invoke every callback registered for `attribute`.
    ///
    /// Returns the number of callbacks that ran to completion.
    pub fn notify(&self, attribute: &str) -> usize {
        let callbacks: Vec<Callback> = self
            .lock()
            .entries
            .iter()
            .filter(|listener| {
                listener
                    .attribute
                    .as_deref()
                    .is_none_or(|name| name == attribute)
            })
            .map(|listener| Arc::clone(&listener.callback))
            .collect();

        let mut delivered = 0;
        for callback in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(attribute))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(attribute, "Property change observer panicked"),
            }
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().entries.len()
    }

    fn insert(&self, attribute: Option<String>, callback: Callback) -> SubscriptionHandle {
        let mut listeners = self.lock();
        let handle = SubscriptionHandle(listeners.next_id);
        listeners.next_id += 1;
        listeners.entries.push(Listener {
            handle,
            attribute,
            callback,
        });
        handle
    }

    fn lock(&self) -> MutexGuard<'_, Listeners> {
        lock_listeners(&self.listeners)
    }
}

impl fmt::Debug for PropertyChanged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyChanged")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Drop guard returned by [`PropertyChanged::subscribe_scoped`].
#[derive(Debug)]
pub struct Subscription {
    listeners: Weak<Mutex<Listeners>>,
    handle: SubscriptionHandle,
}

impl Subscription {
    pub const fn handle(&self) -> SubscriptionHandle {
        self.handle
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            remove(&mut lock_listeners(&listeners), self.handle);
        }
    }
}

fn lock_listeners(listeners: &Mutex<Listeners>) -> MutexGuard<'_, Listeners> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}

fn remove(listeners: &mut Listeners, handle: SubscriptionHandle) -> bool {
    let before = listeners.entries.len();
    listeners.entries.retain(|listener| listener.handle != handle);
    listeners.entries.len() != before
}
