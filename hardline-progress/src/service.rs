//! Generic entity service over one daily table.
//!
//! Reads prefer the remote store when online and fall back to the local cache
//! when offline. Writes are two-phase: the cache is updated first, then the
//! remote write is attempted; if that fails or the device is offline the
//! mutation is queued together with the cache entry it replaced, so it can be
//! rolled back if the queue eventually gives up on it.

use crate::error::ProgressResult;
use chrono::NaiveDate;
use hardline_cloud::{Filter, RemoteStore};
use hardline_storage::{CacheKey, LocalCache};
use hardline_sync::{Connectivity, NewMutation, Rollback, SyncHandle};
use hardline_types::{format_date, ChallengeId, DailyRecord, MutationAction};
use serde_json::{json, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, warn};

/// Collaborators shared by every entity service.
#[derive(Clone)]
pub struct ServiceContext {
    pub remote: Arc<dyn RemoteStore>,
    pub cache: LocalCache,
    pub connectivity: Connectivity,
    pub sync: SyncHandle,
}

/// Per-day reads and two-phase writes for records of type `T`.
///
/// Each `(challenge, date)` is cached as the list of that day's records.
pub struct EntityService<T> {
    ctx: ServiceContext,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for EntityService<T> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx.clone(),
            _record: PhantomData,
        }
    }
}

impl<T: DailyRecord> EntityService<T> {
    pub fn new(ctx: ServiceContext) -> Self {
        Self {
            ctx,
            _record: PhantomData,
        }
    }

    pub fn context(&self) -> &ServiceContext {
        &self.ctx
    }

    pub fn cache_key(challenge_id: &ChallengeId, date: NaiveDate) -> CacheKey {
        CacheKey::new(T::ENTITY, challenge_id.clone(), date)
    }

    /// Records for one day.
    ///
    /// Offline this is the cached list. Online the remote rows are fetched and
    /// replace the cached list; a remote failure is returned to the caller.
    pub async fn list_for_day(
        &self,
        challenge_id: &ChallengeId,
        date: NaiveDate,
    ) -> ProgressResult<Vec<T>> {
        let key = Self::cache_key(challenge_id, date);
        if !self.ctx.connectivity.is_online() {
            debug!("offline, serving {key} from cache");
            return Ok(self.cached(&key));
        }

        let filters = [
            Filter::eq("challenge_id", challenge_id),
            Filter::eq("date", format_date(date)),
        ];
        let rows = self.ctx.remote.select(T::ENTITY.table(), &filters).await?;
        let records: Vec<T> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("skipping malformed {} row: {e}", T::ENTITY);
                    None
                }
            })
            .collect();
        self.ctx.cache.put_as(&key, &records);
        Ok(records)
    }

    /// The day's first record, for tables holding one row per day.
    pub async fn get_for_day(
        &self,
        challenge_id: &ChallengeId,
        date: NaiveDate,
    ) -> ProgressResult<Option<T>> {
        Ok(self.list_for_day(challenge_id, date).await?.into_iter().next())
    }

    /// Like [`list_for_day`](Self::list_for_day) but falls back to the cache on remote failure.
    pub async fn current_for_day(&self, challenge_id: &ChallengeId, date: NaiveDate) -> Vec<T> {
        match self.list_for_day(challenge_id, date).await {
            Ok(records) => records,
            Err(e) => {
                warn!("{} read failed, using cached copy: {e}", T::ENTITY);
                self.cached(&Self::cache_key(challenge_id, date))
            }
        }
    }

    /// Cached records for one day, empty when nothing was cached.
    pub fn cached_for_day(&self, challenge_id: &ChallengeId, date: NaiveDate) -> Vec<T> {
        self.cached(&Self::cache_key(challenge_id, date))
    }

    /// Creates or replaces a record. Remote failures are queued, not returned.
    pub async fn save(&self, record: T) -> ProgressResult<T> {
        let key = Self::cache_key(record.challenge_id(), record.date());
        let mut records = self.cached(&key);
        let (action, prior) = match records.iter().position(|r| r.id() == record.id()) {
            Some(pos) => (
                MutationAction::Update,
                Some(std::mem::replace(&mut records[pos], record.clone())),
            ),
            None => {
                records.push(record.clone());
                (MutationAction::Create, None)
            }
        };
        self.ctx.cache.put_as(&key, &records);

        let payload = serde_json::to_value(&record)?;
        if self.ctx.connectivity.is_online() {
            match self.ctx.remote.upsert(T::ENTITY.table(), &payload).await {
                Ok(row) => {
                    let stored = serde_json::from_value::<T>(row).unwrap_or(record);
                    self.replace_cached(&key, &stored);
                    return Ok(stored);
                }
                Err(e) => warn!("{} write failed, queueing: {e}", T::ENTITY),
            }
        }

        self.enqueue(action, payload, key, record.id(), prior).await?;
        Ok(record)
    }

    /// Deletes a record by id. Remote failures are queued, not returned.
    pub async fn delete(
        &self,
        id: &str,
        challenge_id: &ChallengeId,
        date: NaiveDate,
    ) -> ProgressResult<()> {
        let key = Self::cache_key(challenge_id, date);
        let mut records = self.cached(&key);
        let prior = records
            .iter()
            .position(|r| r.id() == id)
            .map(|pos| records.remove(pos));
        self.ctx.cache.put_as(&key, &records);

        if self.ctx.connectivity.is_online() {
            match self.ctx.remote.delete(T::ENTITY.table(), id).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_not_found() => return Ok(()),
                Err(e) => warn!("{} delete failed, queueing: {e}", T::ENTITY),
            }
        }

        self.enqueue(MutationAction::Delete, json!({ "id": id }), key, id, prior)
            .await
    }

    async fn enqueue(
        &self,
        action: MutationAction,
        payload: Value,
        cache_key: CacheKey,
        record_id: &str,
        prior: Option<T>,
    ) -> ProgressResult<()> {
        let previous = prior.map(serde_json::to_value).transpose()?;
        let mutation = NewMutation::new(T::ENTITY, action, payload).with_rollback(Rollback {
            cache_key,
            record_id: record_id.to_string(),
            previous,
        });
        self.ctx.sync.enqueue(mutation).await?;
        Ok(())
    }

    fn cached(&self, key: &CacheKey) -> Vec<T> {
        self.ctx.cache.get_as(key).unwrap_or_default()
    }

    fn replace_cached(&self, key: &CacheKey, record: &T) {
        let mut records = self.cached(key);
        match records.iter().position(|r| r.id() == record.id()) {
            Some(pos) => records[pos] = record.clone(),
            None => records.push(record.clone()),
        }
        self.ctx.cache.put_as(key, &records);
    }
}
