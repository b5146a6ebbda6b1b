//! Sync status and its broadcaster.
//!
//! Listeners are plain callbacks invoked in registration order. A new
//! listener receives the current status immediately. Async consumers can use
//! [`StatusBroadcaster::watch`] instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub is_online: bool,
    pub is_syncing: bool,
    pub pending_count: usize,
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Queued items that have failed at least once.
    pub error_count: usize,
}

type Listener = Arc<dyn Fn(&SyncStatus) + Send + Sync>;

struct Inner {
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
    current: watch::Sender<SyncStatus>,
}

impl Inner {
    fn listeners(&self) -> MutexGuard<'_, Vec<(u64, Listener)>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: u64) {
        self.listeners().retain(|(lid, _)| *lid != id);
    }
}

#[derive(Clone)]
pub struct StatusBroadcaster {
    inner: Arc<Inner>,
}

impl StatusBroadcaster {
    pub fn new(initial: SyncStatus) -> Self {
        let (current, _) = watch::channel(initial);
        Self {
            inner: Arc::new(Inner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
                current,
            }),
        }
    }

    /// Registers a listener and delivers the current status to it right away.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(listener);
        self.inner.listeners().push((id, listener.clone()));
        listener(&self.current());
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn watch(&self) -> watch::Receiver<SyncStatus> {
        self.inner.current.subscribe()
    }

    pub fn current(&self) -> SyncStatus {
        self.inner.current.borrow().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners().len()
    }

    /// Publishes `status` if it differs from the current one.
    pub fn publish(&self, status: SyncStatus) {
        let changed = self.inner.current.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status.clone();
                true
            }
        });
        if !changed {
            return;
        }

        // Listeners run outside the lock so they may subscribe or unsubscribe.
        let listeners: Vec<Listener> = self
            .inner
            .listeners()
            .iter()
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            listener(&status);
        }
    }
}

impl Default for StatusBroadcaster {
    fn default() -> Self {
        Self::new(SyncStatus::default())
    }
}

impl std::fmt::Debug for StatusBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusBroadcaster")
            .field("current", &self.current())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Keeps a listener registered. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.remove(self.id);
        }
    }
}
