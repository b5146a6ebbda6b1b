//! Best-effort snapshot cache of remote records.
//!
//! Entries have no expiry; callers treat them as "last known good" and prefer
//! live data when online. Storage failures are logged and swallowed: the
//! cache never blocks a caller and never returns an error.

use crate::kv_store::KvStore;
use chrono::{DateTime, NaiveDate, Utc};
use hardline_types::{format_date, ChallengeId, EntityType};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, warn};

/// Composite key of a cached record: entity tag plus natural key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub entity_type: EntityType,
    pub challenge_id: ChallengeId,
    pub date: NaiveDate,
}

impl CacheKey {
    pub fn new(entity_type: EntityType, challenge_id: ChallengeId, date: NaiveDate) -> Self {
        Self {
            entity_type,
            challenge_id,
            date,
        }
    }

    /// Storage key, `<entityType>_<challengeId>_<date>`.
    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}",
            self.entity_type,
            self.challenge_id,
            format_date(self.date)
        )
    }
}

/// A locally stored snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub value: Value,
    pub cached_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct LocalCache {
    store: KvStore,
}

impl LocalCache {
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// Returns the most recently put entry, or `None` if never written or unreadable.
    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        match self.store.get::<CacheEntry>(&key.storage_key()) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("cache read failed for {key}: {e}");
                None
            }
        }
    }

    /// Overwrites the entry for `key`.
    pub fn put(&self, key: &CacheKey, value: Value) {
        let entry = CacheEntry {
            value,
            cached_at: Utc::now(),
        };
        if let Err(e) = self.store.set(&key.storage_key(), &entry) {
            warn!("cache write failed for {key}: {e}");
        }
    }

    pub fn remove(&self, key: &CacheKey) {
        if let Err(e) = self.store.remove(&key.storage_key()) {
            warn!("cache remove failed for {key}: {e}");
        }
    }

    /// Puts one record of a cached list back to `previous`, or takes it out
    /// when `previous` is `None`. The other records under `key` are untouched.
    pub fn restore_record(&self, key: &CacheKey, id: &str, previous: Option<Value>) {
        let mut rows = match self.get(key).map(|e| e.value) {
            Some(Value::Array(rows)) => rows,
            Some(_) => {
                warn!("cache entry {key} is not a record list, skipping restore of {id}");
                return;
            }
            None => Vec::new(),
        };

        let pos = rows
            .iter()
            .position(|row| row.get("id").and_then(Value::as_str) == Some(id));
        match (pos, previous) {
            (Some(pos), Some(row)) => rows[pos] = row,
            (None, Some(row)) => rows.push(row),
            (Some(pos), None) => {
                rows.remove(pos);
            }
            (None, None) => return,
        }

        debug!("restored {id} in {key}");
        self.put(key, Value::Array(rows));
    }

    /// Typed read. An entry that no longer matches the type reads as absent.
    pub fn get_as<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let entry = self.get(key)?;
        match serde_json::from_value(entry.value) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("cached value for {key} has unexpected shape: {e}");
                None
            }
        }
    }

    /// Typed write.
    pub fn put_as<T: Serialize>(&self, key: &CacheKey, value: &T) {
        match serde_json::to_value(value) {
            Ok(json) => self.put(key, json),
            Err(e) => warn!("cache serialization failed for {key}: {e}"),
        }
    }
}
