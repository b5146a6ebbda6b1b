//! Shared fixture: in-memory storage, mock remote and a running sync engine.
#![allow(dead_code)]

use chrono::NaiveDate;
use hardline_cloud::MockRemote;
use hardline_progress::ServiceContext;
use hardline_storage::{KvStore, LocalCache};
use hardline_sync::{
    create_sync_engine, Connectivity, StatusBroadcaster, SyncConfig, SyncHandle, TracingNotifier,
};
use hardline_types::ChallengeId;
use std::sync::Arc;

pub struct Fixture {
    pub store: KvStore,
    pub remote: Arc<MockRemote>,
    pub connectivity: Connectivity,
    pub sync: SyncHandle,
    pub ctx: ServiceContext,
}

impl Fixture {
    pub fn new(online: bool) -> Self {
        let store = KvStore::open_in_memory().unwrap();
        let remote = Arc::new(MockRemote::new());
        let connectivity = Connectivity::new(online);
        let (sync, engine) = create_sync_engine(
            SyncConfig::default(),
            store.clone(),
            remote.clone(),
            connectivity.clone(),
            StatusBroadcaster::default(),
            Arc::new(TracingNotifier),
        );
        tokio::spawn(engine.run());

        let ctx = ServiceContext {
            remote: remote.clone(),
            cache: LocalCache::new(store.clone()),
            connectivity: connectivity.clone(),
            sync: sync.clone(),
        };
        Self {
            store,
            remote,
            connectivity,
            sync,
            ctx,
        }
    }

    pub fn cache(&self) -> &LocalCache {
        &self.ctx.cache
    }
}

pub fn challenge() -> ChallengeId {
    ChallengeId::new("c1")
}

pub fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()
}
