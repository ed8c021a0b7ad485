//! Listener registration.
//!
//! Listeners are kept in registration order. Notification iterates over a
//! snapshot so a listener may add or remove listeners from its callback.

use inapp_types::{Message, Resolution};
use std::sync::{Arc, Mutex, PoisonError};

/// Observes messages going on and off screen.
pub trait InAppMessageListener: Send + Sync {
    fn on_message_displayed(&self, _schedule_id: &str, _message: &Message) {}

    fn on_message_finished(&self, _schedule_id: &str, _message: &Message, _resolution: &Resolution) {
    }
}

/// Ordered set of listeners.
pub struct ListenerRegistry<L: ?Sized> {
    listeners: Mutex<Vec<Arc<L>>>,
}

impl<L: ?Sized> ListenerRegistry<L> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, listener: Arc<L>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Removes a listener by identity. Returns true if it was registered.
    pub fn remove(&self, listener: &Arc<L>) -> bool {
        let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    /// Copy of the current listeners.
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<L: ?Sized> Default for ListenerRegistry<L> {
    fn default() -> Self {
        Self::new()
    }
}
