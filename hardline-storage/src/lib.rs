//! DuckDB storage layer for Hardline.
//!
//! Plays the role browser local storage plays for a web client: a durable
//! key/value table that survives restarts, plus a best-effort cache of the
//! last known remote records on top of it.
//!
//! # Architecture
//!
//! - [`KvStore`] owns the single `local_storage` table and broadcasts a
//!   [`StorageChange`] for every write, tagged with the writing handle's origin
//! - [`LocalCache`] stores per-entity snapshots under
//!   `<entityType>_<challengeId>_<date>` and never surfaces storage errors

mod error;
mod kv_store;
mod local_cache;

pub use error::{StorageError, StorageResult};
pub use kv_store::{KvStore, StorageChange, LAST_SYNC_KEY, QUEUE_KEY};
pub use local_cache::{CacheEntry, CacheKey, LocalCache};
