//! # Subscription Table
//!
//! Topic key → notification callback, one callback per key.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A notification callback. Invoked with the notification's `data`.
pub type Callback = Arc<dyn Fn(Value) + Send + Sync>;

/// Registered notification callbacks of one client.
#[derive(Default)]
pub struct SubscriptionTable {
    callbacks: Mutex<HashMap<String, Callback>>,
}

impl SubscriptionTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Callback>> {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Install `callback` for `key`, returning the callback it replaced.
    pub fn insert(&self, key: impl Into<String>, callback: Callback) -> Option<Callback> {
        self.lock().insert(key.into(), callback)
    }

    /// Remove the callback for `key`.
    pub fn remove(&self, key: &str) -> Option<Callback> {
        self.lock().remove(key)
    }

    /// Put back `previous` if the entry for `key` is still `current`.
    ///
    /// Used to undo a subscription whose NOTIFY round trip failed without
    /// clobbering a newer subscription made in the meantime.
    pub fn restore(&self, key: &str, current: &Callback, previous: Option<Callback>) {
        let mut callbacks = self.lock();
        let still_current = callbacks
            .get(key)
            .is_some_and(|installed| Arc::ptr_eq(installed, current));
        if !still_current {
            return;
        }
        match previous {
            Some(prev) => {
                callbacks.insert(key.to_owned(), prev);
            }
            None => {
                callbacks.remove(key);
            }
        }
    }

    /// The callback currently registered for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Callback> {
        self.lock().get(key).cloned()
    }

    /// Whether a callback is registered for `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Number of subscribed topics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no topic is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke the callback for `key` with `data`.
    ///
    /// The lock is released before the callback runs, so a callback may
    /// subscribe or unsubscribe. Returns `false` if nothing is registered.
    pub fn deliver(&self, key: &str, data: Value) -> bool {
        match self.get(key) {
            Some(callback) => {
                callback(data);
                true
            }
            None => false,
        }
    }
}

impl fmt::Debug for SubscriptionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        f.debug_struct("SubscriptionTable").field("keys", &keys).finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
