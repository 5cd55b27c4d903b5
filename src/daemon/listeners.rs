//! Listener registry for timer state changes.
//!
//! Subscribers register a zero-argument callback under a key they own. The
//! registry holds keys weakly: once every `Arc` to a key is dropped, its
//! callback is never invoked again and the entry is pruned on the next
//! registry access. Dropping the key is therefore equivalent to calling
//! [`ListenerRegistry::remove`].

use std::any::Any;
use std::sync::{Arc, Weak};

/// Callback invoked after each state change.
pub type Listener = Arc<dyn Fn() + Send + Sync>;

struct Entry {
    id: usize,
    key: Weak<dyn Any + Send + Sync>,
    callback: Listener,
}

impl Entry {
    fn is_live(&self) -> bool {
        self.key.strong_count() > 0
    }
}

/// Insertion-ordered, weakly keyed set of listeners.
#[derive(Default)]
pub struct ListenerRegistry {
    entries: Vec<Entry>,
}

fn key_id<K: ?Sized>(key: &Arc<K>) -> usize {
    Arc::as_ptr(key) as *const () as usize
}

impl ListenerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` under `key`.
    ///
    /// Re-registering a live key replaces its callback and keeps its
    /// position in the notification order.
    pub fn insert<K>(&mut self, key: &Arc<K>, callback: Listener)
    where
        K: Any + Send + Sync,
    {
        self.prune();
        let id = key_id(key);

        if let Some(entry) = self.entries.iter_mut().find(|e| e.id == id) {
            entry.callback = callback;
            return;
        }

        let weak: Weak<K> = Arc::downgrade(key);
        let weak: Weak<dyn Any + Send + Sync> = weak;
        self.entries.push(Entry {
            id,
            key: weak,
            callback,
        });
    }

    /// Removes the listener registered under `key`.
    ///
    /// Returns true if an entry was removed.
    pub fn remove<K>(&mut self, key: &Arc<K>) -> bool
    where
        K: Any + Send + Sync,
    {
        self.prune();
        let id = key_id(key);
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    /// Returns the callbacks of live keys in registration order and drops
    /// entries whose keys are gone.
    pub fn live_callbacks(&mut self) -> Vec<Listener> {
        self.prune();
        self.entries.iter().map(|e| Arc::clone(&e.callback)).collect()
    }

    /// Number of live listeners.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_live()).count()
    }

    /// Returns true if no live listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn prune(&mut self) {
        self.entries.retain(Entry::is_live);
    }
}

impl std::fmt::Debug for ListenerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerRegistry")
            .field("listeners", &self.len())
            .finish()
    }
}
