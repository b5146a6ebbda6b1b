//! Persisted queue of mutations waiting to reach the remote store.
//!
//! The whole queue is written to the `sync_queue` key after every change so a
//! restart picks up exactly where the previous process left off. Only the
//! engine task mutates a [`SyncQueue`].

use crate::error::SyncResult;
use chrono::{DateTime, Utc};
use hardline_storage::{CacheKey, KvStore, LAST_SYNC_KEY, QUEUE_KEY};
use hardline_types::{EntityType, MutationAction};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

/// Compensation applied to one cached record when its write is dropped at the retry cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollback {
    /// Day list holding the record.
    pub cache_key: CacheKey,
    pub record_id: String,
    /// The record as cached before the optimistic write; `None` if it was new.
    pub previous: Option<Value>,
}

impl Rollback {
    fn targets(&self, other: &Rollback) -> bool {
        self.cache_key == other.cache_key && self.record_id == other.record_id
    }
}

/// A pending mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: Uuid,
    pub entity_type: EntityType,
    pub action: MutationAction,
    pub table: String,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<Rollback>,
}

impl QueueItem {
    /// Remote row id carried by the payload, if any.
    pub fn record_id(&self) -> Option<&str> {
        self.payload.get("id")?.as_str()
    }
}

/// A mutation as submitted by a caller, before it is assigned an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMutation {
    pub entity_type: EntityType,
    pub action: MutationAction,
    pub table: String,
    pub payload: Value,
    pub rollback: Option<Rollback>,
}

impl NewMutation {
    /// A mutation against the entity's own table.
    pub fn new(entity_type: EntityType, action: MutationAction, payload: Value) -> Self {
        Self {
            entity_type,
            action,
            table: entity_type.table().to_string(),
            payload,
            rollback: None,
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_rollback(mut self, rollback: Rollback) -> Self {
        self.rollback = Some(rollback);
        self
    }

    fn into_item(self) -> QueueItem {
        QueueItem {
            id: Uuid::new_v4(),
            entity_type: self.entity_type,
            action: self.action,
            table: self.table,
            payload: self.payload,
            enqueued_at: Utc::now(),
            retry_count: 0,
            last_error: None,
            rollback: self.rollback,
        }
    }
}

/// Result of recording a failed replay.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureOutcome {
    /// Still queued with the new retry count.
    Retrying(u32),
    /// Reached the cap and was removed.
    Dropped(QueueItem),
    /// No such item (already resolved, or replaced by a reconcile).
    Missing,
}

pub struct SyncQueue {
    store: KvStore,
    items: Vec<QueueItem>,
    last_sync_at: Option<DateTime<Utc>>,
}

impl SyncQueue {
    /// Loads the persisted queue. An unreadable queue starts empty.
    pub fn load(store: KvStore) -> Self {
        let items = read_items(&store);
        let last_sync_at = read_last_sync(&store);
        debug!("loaded sync queue with {} item(s)", items.len());
        Self {
            store,
            items,
            last_sync_at,
        }
    }

    /// Replaces in-memory state with whatever is currently persisted.
    pub fn reload(&mut self) {
        self.items = read_items(&self.store);
        self.last_sync_at = read_last_sync(&self.store);
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items that have failed at least once.
    pub fn error_count(&self) -> usize {
        self.items.iter().filter(|i| i.retry_count > 0).count()
    }

    pub fn last_sync_at(&self) -> Option<DateTime<Utc>> {
        self.last_sync_at
    }

    /// Appends a mutation and persists.
    pub fn push(&mut self, mutation: NewMutation) -> QueueItem {
        let item = mutation.into_item();
        debug!(
            "queued {} {} ({})",
            item.action, item.entity_type, item.id
        );
        self.items.push(item.clone());
        self.persist_logged();
        item
    }

    /// Copy of the current items in enqueue order.
    pub fn snapshot(&self) -> Vec<QueueItem> {
        self.items.clone()
    }

    /// Removes a successfully replayed item.
    pub fn resolve(&mut self, id: Uuid) -> Option<QueueItem> {
        let pos = self.items.iter().position(|i| i.id == id)?;
        let item = self.items.remove(pos);
        self.persist_logged();
        Some(item)
    }

    /// Records a failed replay, dropping the item once it reaches `max_retries`.
    pub fn record_failure(&mut self, id: Uuid, error: String, max_retries: u32) -> FailureOutcome {
        let Some(pos) = self.items.iter().position(|i| i.id == id) else {
            return FailureOutcome::Missing;
        };

        let item = &mut self.items[pos];
        item.retry_count += 1;
        item.last_error = Some(error);
        let retry_count = item.retry_count;

        let outcome = if retry_count >= max_retries {
            FailureOutcome::Dropped(self.items.remove(pos))
        } else {
            FailureOutcome::Retrying(retry_count)
        };
        self.persist_logged();
        outcome
    }

    /// Hands a dropped item's rollback to the next queued write of the same
    /// record, whose optimistic value then stays in the cache.
    ///
    /// Returns false when no such write is queued; the caller must apply the
    /// rollback itself.
    pub fn hand_over_rollback(&mut self, dropped: &QueueItem) -> bool {
        let Some(rollback) = &dropped.rollback else {
            return false;
        };
        let Some(next) = self
            .items
            .iter_mut()
            .filter_map(|i| i.rollback.as_mut())
            .find(|r| r.targets(rollback))
        else {
            return false;
        };
        next.previous = rollback.previous.clone();
        self.persist_logged();
        true
    }

    /// Records the end of a fully successful drain.
    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.last_sync_at = Some(at);
        if let Err(e) = self.store.set(LAST_SYNC_KEY, &at) {
            warn!("failed to persist last sync time: {e}");
        }
    }

    pub fn persist(&self) -> SyncResult<()> {
        self.store.set(QUEUE_KEY, &self.items)?;
        Ok(())
    }

    fn persist_logged(&self) {
        if let Err(e) = self.persist() {
            warn!("failed to persist sync queue: {e}");
        }
    }
}

fn read_items(store: &KvStore) -> Vec<QueueItem> {
    match store.get::<Vec<QueueItem>>(QUEUE_KEY) {
        Ok(items) => items.unwrap_or_default(),
        Err(e) => {
            warn!("discarding unreadable sync queue: {e}");
            Vec::new()
        }
    }
}

fn read_last_sync(store: &KvStore) -> Option<DateTime<Utc>> {
    store.get(LAST_SYNC_KEY).unwrap_or_else(|e| {
        warn!("unreadable last sync time: {e}");
        None
    })
}
