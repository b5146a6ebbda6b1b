//! Replays one queued mutation against the remote store.
//!
//! Every action is made idempotent so an item replayed twice (after a crash,
//! or from two processes sharing a queue) has the effect of being applied once:
//! creates fall back to upsert on conflict, updates are upserts, and deletes
//! treat a missing row as success.

use crate::queue::QueueItem;
use hardline_cloud::{Filter, RemoteError, RemoteResult, RemoteStore};
use hardline_types::MutationAction;
use tracing::debug;

pub async fn replay(remote: &dyn RemoteStore, item: &QueueItem) -> RemoteResult<()> {
    match item.action {
        MutationAction::Create => replay_create(remote, item).await,
        MutationAction::Update => {
            require_id(item)?;
            remote.upsert(&item.table, &item.payload).await.map(|_| ())
        }
        MutationAction::Delete => {
            let id = require_id(item)?;
            match remote.delete(&item.table, id).await {
                Err(e) if e.is_not_found() => {
                    debug!("{}/{id} already gone, delete is a no-op", item.table);
                    Ok(())
                }
                other => other,
            }
        }
    }
}

async fn replay_create(remote: &dyn RemoteStore, item: &QueueItem) -> RemoteResult<()> {
    let Some(id) = item.record_id() else {
        return remote.insert(&item.table, &item.payload).await.map(|_| ());
    };

    let existing = remote
        .select(&item.table, &[Filter::eq("id", id)])
        .await?;
    if !existing.is_empty() {
        debug!("{}/{id} already exists, applying create as upsert", item.table);
        return remote.upsert(&item.table, &item.payload).await.map(|_| ());
    }

    match remote.insert(&item.table, &item.payload).await {
        Err(e) if e.is_unique_violation() => {
            debug!("{}/{id} inserted concurrently, retrying as upsert", item.table);
            remote.upsert(&item.table, &item.payload).await.map(|_| ())
        }
        other => other.map(|_| ()),
    }
}

fn require_id(item: &QueueItem) -> RemoteResult<&str> {
    item.record_id().ok_or_else(|| {
        RemoteError::InvalidPayload(format!(
            "{} on {} requires a payload id",
            item.action, item.table
        ))
    })
}
