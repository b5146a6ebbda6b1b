//! Shared helpers for sync engine tests.
#![allow(dead_code)]

use chrono::NaiveDate;
use hardline_cloud::MockRemote;
use hardline_storage::{CacheKey, KvStore};
use hardline_sync::{
    create_sync_engine, Connectivity, NewMutation, Notifier, QueueItem, Rollback, StatusBroadcaster,
    SyncConfig, SyncHandle, SyncStatus,
};
use hardline_types::{ChallengeId, EntityType, MutationAction};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Notifier that records every dropped item.
#[derive(Default)]
pub struct RecordingNotifier {
    failures: Mutex<Vec<(Uuid, String)>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.failures.lock().unwrap().len()
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.failures.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn sync_failed(&self, item: &QueueItem, reason: &str) {
        self.failures
            .lock()
            .unwrap()
            .push((item.id, reason.to_string()));
    }
}

pub struct Harness {
    pub store: KvStore,
    pub remote: Arc<MockRemote>,
    pub connectivity: Connectivity,
    pub notifier: Arc<RecordingNotifier>,
    pub handle: SyncHandle,
    pub task: JoinHandle<()>,
}

impl Harness {
    pub fn start(online: bool) -> Self {
        Self::start_with(
            KvStore::open_in_memory().unwrap(),
            Arc::new(MockRemote::new()),
            online,
        )
    }

    pub fn start_with(store: KvStore, remote: Arc<MockRemote>, online: bool) -> Self {
        let connectivity = Connectivity::new(online);
        let notifier = Arc::new(RecordingNotifier::default());
        let (handle, engine) = create_sync_engine(
            SyncConfig::default(),
            store.clone(),
            remote.clone(),
            connectivity.clone(),
            StatusBroadcaster::default(),
            notifier.clone(),
        );
        let task = tokio::spawn(engine.run());
        Self {
            store,
            remote,
            connectivity,
            notifier,
            handle,
            task,
        }
    }

    /// Waits until the broadcast status satisfies `pred`.
    pub async fn wait_until(&self, pred: impl Fn(&SyncStatus) -> bool) -> SyncStatus {
        let mut rx = self.handle.watch_status();
        let status = tokio::time::timeout(Duration::from_secs(60), rx.wait_for(|s| pred(s)))
            .await
            .expect("status condition not reached")
            .expect("status channel closed");
        status.clone()
    }

    /// Waits until no drain is running and the queue has `pending` items.
    pub async fn wait_idle(&self, pending: usize) -> SyncStatus {
        self.wait_until(|s| !s.is_syncing && s.pending_count == pending)
            .await
    }

    pub async fn stop(self) {
        self.handle.stop().await.unwrap();
        self.task.await.unwrap();
    }
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
}

pub fn water_key() -> CacheKey {
    CacheKey::new(EntityType::WaterIntake, ChallengeId::new("c1"), day())
}

pub fn water_payload(id: &str, amount_oz: f64) -> serde_json::Value {
    json!({
        "id": id,
        "challenge_id": "c1",
        "date": "2025-03-14",
        "amount_oz": amount_oz
    })
}

pub fn rollback(id: &str, previous: Option<serde_json::Value>) -> Rollback {
    Rollback {
        cache_key: water_key(),
        record_id: id.into(),
        previous,
    }
}

pub fn water_update(id: &str, amount_oz: f64) -> NewMutation {
    NewMutation::new(
        EntityType::WaterIntake,
        MutationAction::Update,
        water_payload(id, amount_oz),
    )
}

pub fn water_create(id: &str, amount_oz: f64) -> NewMutation {
    NewMutation::new(
        EntityType::WaterIntake,
        MutationAction::Create,
        water_payload(id, amount_oz),
    )
}
