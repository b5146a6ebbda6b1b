//! Durable key/value store, the native stand-in for browser local storage.
//!
//! Values are JSON text. Every write or removal is announced on a broadcast
//! channel together with the origin of the handle that made it, so a second
//! handle (another window or process sharing the database) can react to
//! changes it did not make itself.

use crate::error::StorageResult;
use duckdb::{params, Connection};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Key holding the serialized sync queue.
pub const QUEUE_KEY: &str = "sync_queue";

/// Key holding the timestamp of the last fully successful drain.
pub const LAST_SYNC_KEY: &str = "last_sync_time";

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// The store holds a few small JSON documents; keep DuckDB's footprint minimal.
const CONNECTION_PRAGMAS: &str = "PRAGMA memory_limit='64MB'; PRAGMA threads=1;";

/// Notification that a key was written or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageChange {
    pub key: String,
    /// Origin of the handle that made the change.
    pub origin: Uuid,
}

/// Key/value store backed by a single DuckDB table.
#[derive(Clone)]
pub struct KvStore {
    conn: Arc<Mutex<Connection>>,
    changes: broadcast::Sender<StorageChange>,
    origin: Uuid,
}

impl KvStore {
    /// Opens or creates a store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = open_recovering(path)?;
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        initialize_kv_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_kv_schema(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            conn: Arc::new(Mutex::new(conn)),
            changes,
            origin: Uuid::new_v4(),
        }
    }

    /// Returns a second handle on the same storage with its own origin.
    ///
    /// Writes through the new handle are reported to subscribers of this one
    /// as external changes, and vice versa.
    pub fn attach(&self) -> Self {
        Self {
            conn: self.conn.clone(),
            changes: self.changes.clone(),
            origin: Uuid::new_v4(),
        }
    }

    pub fn origin(&self) -> Uuid {
        self.origin
    }

    /// Subscribes to change notifications from every handle on this storage.
    pub fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.changes.subscribe()
    }

    pub fn get_raw(&self, key: &str) -> StorageResult<Option<String>> {
        let conn = self.lock();
        let result = conn.query_row(
            "SELECT value FROM local_storage WHERE key = ?",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_raw(&self, key: &str, value: &str) -> StorageResult<()> {
        {
            let conn = self.lock();
            conn.execute(
                "INSERT OR REPLACE INTO local_storage (key, value, updated_at) VALUES (?, ?, ?)",
                params![key, value, chrono::Utc::now().timestamp_millis()],
            )?;
        }
        self.announce(key);
        Ok(())
    }

    /// Removes a key. Returns whether it existed.
    pub fn remove(&self, key: &str) -> StorageResult<bool> {
        let removed = {
            let conn = self.lock();
            conn.execute("DELETE FROM local_storage WHERE key = ?", params![key])?
        };
        if removed > 0 {
            self.announce(key);
        }
        Ok(removed > 0)
    }

    /// Lists keys starting with `prefix`, in key order.
    pub fn keys_with_prefix(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn
            .prepare("SELECT key FROM local_storage WHERE starts_with(key, ?) ORDER BY key")?;
        let keys = stmt
            .query_map(params![prefix], |row| row.get::<_, String>(0))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(keys)
    }

    /// Reads and deserializes a JSON value.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        match self.get_raw(key)? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Serializes and writes a JSON value.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StorageResult<()> {
        let raw = serde_json::to_string(value)?;
        self.set_raw(key, &raw)
    }

    fn announce(&self, key: &str) {
        // No receivers is fine; nobody is listening yet.
        let _ = self.changes.send(StorageChange {
            key: key.to_string(),
            origin: self.origin,
        });
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn initialize_kv_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS local_storage (
            key VARCHAR PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at BIGINT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

/// Opens the database, retrying once without the write-ahead log when a
/// stale `<file>.wal` left by an unclean exit blocks the first attempt.
fn open_recovering(path: &Path) -> StorageResult<Connection> {
    let first_err = match Connection::open(path) {
        Ok(conn) => return Ok(conn),
        Err(e) => e,
    };

    let mut wal = path.as_os_str().to_owned();
    wal.push(".wal");
    let wal = Path::new(&wal);
    if !wal.exists() {
        return Err(first_err.into());
    }

    tracing::warn!(
        "opening {} failed ({first_err}), discarding {}",
        path.display(),
        wal.display()
    );
    std::fs::remove_file(wal)?;
    Ok(Connection::open(path)?)
}
