//! Offline sync queue for Hardline.
//!
//! Mutations that could not reach the remote store are queued here and
//! replayed later. The [`SyncEngine`] owns the queue and drains it on a fixed
//! interval, when connectivity returns, when the app becomes visible again,
//! and right after an enqueue while online.
//!
//! Delivery is at-least-once: every replay is idempotent, and an item leaves
//! the queue either on success or after [`SyncConfig::max_retries`] failed
//! attempts, in which case its optimistic cache write is rolled back and the
//! [`Notifier`] is told.

pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod notifier;
pub mod queue;
pub mod replay;
pub mod status;

pub use config::SyncConfig;
pub use connectivity::Connectivity;
pub use engine::{create_sync_engine, DrainReport, DrainSkipped, SyncEngine, SyncHandle};
pub use error::{SyncError, SyncResult};
pub use notifier::{Notifier, TracingNotifier};
pub use queue::{FailureOutcome, NewMutation, QueueItem, Rollback, SyncQueue};
pub use status::{StatusBroadcaster, Subscription, SyncStatus};
