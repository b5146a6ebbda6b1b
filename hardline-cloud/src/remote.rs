//! Remote store abstractions.

use crate::error::RemoteResult;
use crate::types::{Filter, RemoteUser};
use async_trait::async_trait;
use serde_json::Value;

/// Table-level CRUD against the hosted backend.
///
/// Every table is keyed by a string `id` column.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads all rows matching every filter.
    async fn select(&self, table: &str, filters: &[Filter]) -> RemoteResult<Vec<Value>>;

    /// Inserts a row. Fails with `UniqueViolation` if the id already exists.
    async fn insert(&self, table: &str, row: &Value) -> RemoteResult<Value>;

    /// Inserts or merges a row keyed by its `id`.
    async fn upsert(&self, table: &str, row: &Value) -> RemoteResult<Value>;

    /// Patches an existing row. Fails with `NotFound` if it does not exist.
    async fn update(&self, table: &str, id: &str, patch: &Value) -> RemoteResult<Value>;

    /// Deletes a row. Fails with `NotFound` if it does not exist.
    async fn delete(&self, table: &str, id: &str) -> RemoteResult<()>;

    /// Identity of the signed-in user.
    async fn current_user(&self) -> RemoteResult<RemoteUser>;
}

/// Binary object storage used for photo attachments.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> RemoteResult<()>;

    fn public_url(&self, bucket: &str, path: &str) -> String;

    async fn remove(&self, bucket: &str, path: &str) -> RemoteResult<()>;
}
