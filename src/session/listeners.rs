//! Listener sets with unsubscribe handles
//!
//! Each event stream (data, log, status) gets its own typed [`ListenerSet`].
//! A listener is either global or scoped to one session id. Emission is
//! synchronous: every matching listener runs before `emit` returns.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Listener<E> {
    id: u64,
    scope: Option<String>,
    callback: Callback<E>,
}

struct Slots<E> {
    next_id: u64,
    listeners: Vec<Listener<E>>,
}

pub struct ListenerSet<E> {
    slots: Arc<Mutex<Slots<E>>>,
}

impl<E: 'static> Default for ListenerSet<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> ListenerSet<E> {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(Slots {
                next_id: 1,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a listener. `scope = Some(id)` limits it to one session.
    pub fn subscribe<F>(&self, scope: Option<&str>, callback: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut slots = self.slots.lock();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.listeners.push(Listener {
                id,
                scope: scope.map(str::to_string),
                callback: Arc::new(callback),
            });
            id
        };

        let weak: Weak<Mutex<Slots<E>>> = Arc::downgrade(&self.slots);
        Subscription::new(move || {
            if let Some(slots) = weak.upgrade() {
                slots.lock().listeners.retain(|l| l.id != id);
            }
        })
    }

    /// Deliver `event` to global listeners and to those scoped to
    /// `session_id`, in registration order.
    pub fn emit(&self, session_id: &str, event: &E) {
        // Snapshot so listeners may (un)subscribe while being called
        let targets: Vec<Callback<E>> = self
            .slots
            .lock()
            .listeners
            .iter()
            .filter(|l| l.scope.as_deref().map_or(true, |s| s == session_id))
            .map(|l| l.callback.clone())
            .collect();

        for callback in targets {
            callback(event);
        }
    }

    /// Drop every listener scoped to `session_id`
    pub fn remove_scope(&self, session_id: &str) {
        self.slots
            .lock()
            .listeners
            .retain(|l| l.scope.as_deref() != Some(session_id));
    }

    pub fn len(&self) -> usize {
        self.slots.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Unsubscribe handle. Dropping it removes the listener; call
/// [`detach`](Self::detach) to keep the listener for the set's lifetime.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
