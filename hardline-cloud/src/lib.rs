//! Remote store collaborators for Hardline.
//!
//! Provides everything the sync core needs from the hosted backend:
//! - `RemoteStore` for table reads and writes (equality filters, upsert by id)
//! - `ObjectStorage` for progress photo uploads
//! - `RestClient`, the PostgREST/Supabase implementation of both
//! - Error classification separating benign conflicts from real failures
//! - Realtime change payloads pushed by the backend
//! - `MockRemote`, an in-memory implementation with fault injection

pub mod config;
pub mod error;
pub mod mock;
pub mod realtime;
pub mod remote;
pub mod rest_client;
pub mod types;

pub use config::CloudConfig;
pub use error::{RemoteError, RemoteResult};
pub use mock::{FailureKind, MockRemote, RemoteOp};
pub use realtime::{ChangeKind, RemoteChange, TableSubscription};
pub use remote::{ObjectStorage, RemoteStore};
pub use rest_client::RestClient;
pub use types::*;
