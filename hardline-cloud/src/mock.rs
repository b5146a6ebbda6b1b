//! In-memory remote store for testing and offline demos.
//!
//! [`MockRemote`] implements both [`RemoteStore`] and [`ObjectStorage`] with
//! the same conflict semantics as the real backend, so replay logic can be
//! exercised without a network.
//!
//! # Features
//!
//! - **Failure injection**: fail specific operations on specific tables, a
//!   fixed number of times or until cleared
//! - **Unreachable mode**: every call fails with a network error
//! - **Hold/release**: park every call until released, to observe in-flight work
//! - **Call log**: count operations per table

use crate::error::{RemoteError, RemoteResult};
use crate::remote::{ObjectStorage, RemoteStore};
use crate::types::{Filter, RemoteUser};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use uuid::Uuid;

/// Operation kinds recorded in the call log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    Select,
    Insert,
    Upsert,
    Update,
    Delete,
    CurrentUser,
    Upload,
    RemoveObject,
}

/// Error to inject. Converted into a fresh [`RemoteError`] on every hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    Network,
    Server(u16),
    UniqueViolation,
    NotFound,
    Unauthorized,
}

impl FailureKind {
    fn to_error(&self, table: &str) -> RemoteError {
        match self {
            FailureKind::Network => RemoteError::Network("connection reset".into()),
            FailureKind::Server(status) => RemoteError::Server {
                status: *status,
                message: "injected failure".into(),
            },
            FailureKind::UniqueViolation => RemoteError::UniqueViolation(format!(
                "duplicate key value violates unique constraint \"{table}_pkey\""
            )),
            FailureKind::NotFound => RemoteError::NotFound(table.to_string()),
            FailureKind::Unauthorized => RemoteError::Unauthorized("JWT expired".into()),
        }
    }
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    op: RemoteOp,
    table: String,
    kind: FailureKind,
    /// `None` fails until cleared.
    remaining: Option<u32>,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteCall {
    pub op: RemoteOp,
    pub table: String,
    pub id: Option<String>,
}

pub struct MockRemote {
    tables: Mutex<HashMap<String, BTreeMap<String, Value>>>,
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    calls: Mutex<Vec<RemoteCall>>,
    failures: Mutex<Vec<ScriptedFailure>>,
    unreachable: AtomicBool,
    held: watch::Sender<bool>,
    user: RemoteUser,
}

impl std::fmt::Debug for MockRemote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockRemote")
            .field("unreachable", &self.unreachable.load(Ordering::Relaxed))
            .field("held", &*self.held.borrow())
            .finish()
    }
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MockRemote {
    pub fn new() -> Self {
        let (held, _) = watch::channel(false);
        Self {
            tables: Mutex::new(HashMap::new()),
            objects: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            unreachable: AtomicBool::new(false),
            held,
            user: RemoteUser {
                id: "mock-user".into(),
                email: Some("mock@example.com".into()),
            },
        }
    }

    // ── Seeding and inspection ──

    /// Stores a row directly, bypassing the call log and failure injection.
    pub fn seed(&self, table: &str, row: Value) {
        let id = row_id(&row).unwrap_or_else(|| Uuid::new_v4().to_string());
        lock(&self.tables)
            .entry(table.to_string())
            .or_default()
            .insert(id, row);
    }

    pub fn row(&self, table: &str, id: &str) -> Option<Value> {
        lock(&self.tables).get(table).and_then(|t| t.get(id)).cloned()
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        lock(&self.tables)
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, path: &str) -> Option<Vec<u8>> {
        lock(&self.objects)
            .get(&format!("{bucket}/{path}"))
            .map(|(bytes, _)| bytes.clone())
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, op: RemoteOp, table: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| c.op == op && c.table == table)
            .count()
    }

    /// Number of write calls (insert, upsert, update, delete) touching `table`.
    pub fn write_count(&self, table: &str) -> usize {
        lock(&self.calls)
            .iter()
            .filter(|c| {
                c.table == table
                    && matches!(
                        c.op,
                        RemoteOp::Insert | RemoteOp::Upsert | RemoteOp::Update | RemoteOp::Delete
                    )
            })
            .count()
    }

    pub fn reset_calls(&self) {
        lock(&self.calls).clear();
    }

    // ── Failure injection ──

    /// Fails `op` on `table` the next `times` calls.
    pub fn fail_times(&self, op: RemoteOp, table: &str, kind: FailureKind, times: u32) {
        lock(&self.failures).push(ScriptedFailure {
            op,
            table: table.to_string(),
            kind,
            remaining: Some(times),
        });
    }

    /// Fails `op` on `table` until [`clear_failures`](Self::clear_failures).
    pub fn fail_always(&self, op: RemoteOp, table: &str, kind: FailureKind) {
        lock(&self.failures).push(ScriptedFailure {
            op,
            table: table.to_string(),
            kind,
            remaining: None,
        });
    }

    pub fn clear_failures(&self) {
        lock(&self.failures).clear();
    }

    /// Makes every call fail with a network error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Parks every subsequent call until [`release`](Self::release).
    pub fn hold(&self) {
        self.held.send_replace(true);
    }

    pub fn release(&self) {
        self.held.send_replace(false);
    }

    // ── Internals ──

    async fn enter(&self, op: RemoteOp, table: &str, id: Option<&str>) -> RemoteResult<()> {
        lock(&self.calls).push(RemoteCall {
            op,
            table: table.to_string(),
            id: id.map(str::to_string),
        });

        let mut held = self.held.subscribe();
        // The sender lives in `self`, so this only errors if `self` is gone.
        let _ = held.wait_for(|h| !*h).await;

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(FailureKind::Network.to_error(table));
        }

        let mut failures = lock(&self.failures);
        if let Some(pos) = failures
            .iter()
            .position(|f| f.op == op && f.table == table)
        {
            let err = failures[pos].kind.to_error(table);
            match failures[pos].remaining {
                Some(n) if n <= 1 => {
                    failures.remove(pos);
                }
                Some(n) => failures[pos].remaining = Some(n - 1),
                None => {}
            }
            return Err(err);
        }
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn row_id(row: &Value) -> Option<String> {
    match row.get("id")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn merge(target: &mut Value, patch: &Value) {
    match (target.as_object_mut(), patch.as_object()) {
        (Some(target), Some(patch)) => {
            for (k, v) in patch {
                target.insert(k.clone(), v.clone());
            }
        }
        _ => *target = patch.clone(),
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn select(&self, table: &str, filters: &[Filter]) -> RemoteResult<Vec<Value>> {
        self.enter(RemoteOp::Select, table, None).await?;
        Ok(lock(&self.tables)
            .get(table)
            .map(|t| {
                t.values()
                    .filter(|row| filters.iter().all(|f| f.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn insert(&self, table: &str, row: &Value) -> RemoteResult<Value> {
        let id = row_id(row);
        self.enter(RemoteOp::Insert, table, id.as_deref()).await?;

        let mut row = row.clone();
        let id = match id {
            Some(id) => id,
            None => {
                let id = Uuid::new_v4().to_string();
                merge(&mut row, &serde_json::json!({ "id": id }));
                id
            }
        };

        let mut tables = lock(&self.tables);
        let rows = tables.entry(table.to_string()).or_default();
        if rows.contains_key(&id) {
            return Err(FailureKind::UniqueViolation.to_error(table));
        }
        rows.insert(id, row.clone());
        Ok(row)
    }

    async fn upsert(&self, table: &str, row: &Value) -> RemoteResult<Value> {
        let id = row_id(row);
        self.enter(RemoteOp::Upsert, table, id.as_deref()).await?;
        let id = id.ok_or_else(|| RemoteError::InvalidPayload("upsert requires an id".into()))?;

        let mut tables = lock(&self.tables);
        let rows = tables.entry(table.to_string()).or_default();
        let stored = rows
            .entry(id)
            .and_modify(|existing| merge(existing, row))
            .or_insert_with(|| row.clone());
        Ok(stored.clone())
    }

    async fn update(&self, table: &str, id: &str, patch: &Value) -> RemoteResult<Value> {
        self.enter(RemoteOp::Update, table, Some(id)).await?;
        let mut tables = lock(&self.tables);
        let existing = tables
            .get_mut(table)
            .and_then(|t| t.get_mut(id))
            .ok_or_else(|| RemoteError::NotFound(format!("{table}/{id}")))?;
        merge(existing, patch);
        Ok(existing.clone())
    }

    async fn delete(&self, table: &str, id: &str) -> RemoteResult<()> {
        self.enter(RemoteOp::Delete, table, Some(id)).await?;
        lock(&self.tables)
            .get_mut(table)
            .and_then(|t| t.remove(id))
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(format!("{table}/{id}")))
    }

    async fn current_user(&self) -> RemoteResult<RemoteUser> {
        self.enter(RemoteOp::CurrentUser, "auth", None).await?;
        Ok(self.user.clone())
    }
}

#[async_trait]
impl ObjectStorage for MockRemote {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> RemoteResult<()> {
        self.enter(RemoteOp::Upload, bucket, Some(path)).await?;
        lock(&self.objects).insert(
            format!("{bucket}/{path}"),
            (bytes, content_type.to_string()),
        );
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("mock://storage/{bucket}/{path}")
    }

    async fn remove(&self, bucket: &str, path: &str) -> RemoteResult<()> {
        self.enter(RemoteOp::RemoveObject, bucket, Some(path)).await?;
        lock(&self.objects)
            .remove(&format!("{bucket}/{path}"))
            .map(|_| ())
            .ok_or_else(|| RemoteError::NotFound(format!("{bucket}/{path}")))
    }
}
