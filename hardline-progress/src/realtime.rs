//! Folds realtime changes from the backend into the local cache.

use crate::aggregate::ProgressAggregator;
use hardline_cloud::{ChangeKind, RemoteChange};
use hardline_storage::{CacheKey, LocalCache};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct ChangeApplier {
    cache: LocalCache,
    aggregator: Arc<ProgressAggregator>,
}

impl ChangeApplier {
    pub fn new(cache: LocalCache, aggregator: Arc<ProgressAggregator>) -> Self {
        Self { cache, aggregator }
    }

    /// Applies one change to the cached day it belongs to.
    ///
    /// Returns false when the change cannot be placed: an unknown table, or a
    /// payload without id, challenge and date.
    pub fn apply(&self, change: &RemoteChange) -> bool {
        let Some(entity) = change.entity_type() else {
            debug!("ignoring change on untracked table {}", change.table);
            return false;
        };
        let (Some((challenge_id, date)), Some(id)) = (change.natural_key(), change.record_id())
        else {
            debug!("ignoring {} change without a natural key", change.table);
            return false;
        };

        let key = CacheKey::new(entity, challenge_id.clone(), date);
        let mut rows = match self.cache.get(&key).map(|e| e.value) {
            Some(Value::Array(rows)) => rows,
            _ => Vec::new(),
        };
        let existing = rows
            .iter()
            .position(|row| row.get("id").and_then(Value::as_str) == Some(id));

        match (change.kind, &change.record) {
            (ChangeKind::Delete, _) => {
                if let Some(pos) = existing {
                    rows.remove(pos);
                }
            }
            (_, Some(record)) => match existing {
                Some(pos) => rows[pos] = record.clone(),
                None => rows.push(record.clone()),
            },
            (_, None) => return false,
        }

        self.cache.put(&key, Value::Array(rows));
        self.aggregator.invalidate(&challenge_id, date);
        debug!("applied remote {:?} on {key}", change.kind);
        true
    }
}
