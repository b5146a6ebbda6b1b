//! Process-wide wiring.
//!
//! `AppContext` owns the single instance of every collaborator and hands
//! them out explicitly. Nothing here is global.

use crate::config::AppConfig;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use hardline_cloud::{ObjectStorage, RemoteChange, RemoteStore, RestClient};
use hardline_progress::{
    AggregationResult, ChangeApplier, DailyProgressService, NoteService, PhotoService,
    ProgressAggregator, ServiceContext, WalkService, WaterIntakeService, WorkoutService,
};
use hardline_storage::{KvStore, LocalCache};
use hardline_sync::{
    create_sync_engine, Connectivity, Notifier, StatusBroadcaster, SyncHandle, SyncStatus,
    TracingNotifier,
};
use hardline_types::ChallengeId;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// The entity services, one per daily table.
#[derive(Clone)]
pub struct Services {
    pub progress: DailyProgressService,
    pub water: WaterIntakeService,
    pub workouts: WorkoutService,
    pub walks: WalkService,
    pub photos: PhotoService,
    pub notes: NoteService,
}

impl Services {
    fn new(ctx: &ServiceContext, objects: Arc<dyn ObjectStorage>, bucket: &str) -> Self {
        Self {
            progress: DailyProgressService::new(ctx.clone()),
            water: WaterIntakeService::new(ctx.clone()),
            workouts: WorkoutService::new(ctx.clone()),
            walks: WalkService::new(ctx.clone()),
            photos: PhotoService::new(ctx.clone(), objects, bucket),
            notes: NoteService::new(ctx.clone()),
        }
    }
}

/// Remote collaborators, injectable so the context can run against a mock.
pub struct Backend {
    pub remote: Arc<dyn RemoteStore>,
    pub objects: Arc<dyn ObjectStorage>,
    pub notifier: Arc<dyn Notifier>,
}

impl Backend {
    /// The hosted backend described by `config.cloud`.
    pub fn rest(config: &AppConfig) -> Result<Self> {
        let client = Arc::new(
            RestClient::new(config.cloud.clone()).context("failed to create REST client")?,
        );
        Ok(Self {
            remote: client.clone(),
            objects: client,
            notifier: Arc::new(TracingNotifier),
        })
    }
}

pub struct AppContext {
    config: AppConfig,
    store: KvStore,
    cache: LocalCache,
    connectivity: Connectivity,
    status: StatusBroadcaster,
    sync: SyncHandle,
    services: Services,
    aggregator: Arc<ProgressAggregator>,
    changes: ChangeApplier,
    engine: JoinHandle<()>,
}

impl AppContext {
    /// Opens storage, connects the REST backend and spawns the sync engine.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn start(config: AppConfig) -> Result<Self> {
        let backend = Backend::rest(&config)?;
        Self::start_with(config, backend).await
    }

    pub async fn start_with(config: AppConfig, backend: Backend) -> Result<Self> {
        let store = if config.is_in_memory() {
            KvStore::open_in_memory().context("failed to open in-memory store")?
        } else {
            KvStore::open(&config.data_path).with_context(|| {
                format!("failed to open store at {}", config.data_path.display())
            })?
        };
        let cache = LocalCache::new(store.clone());
        let connectivity = Connectivity::default();
        let status = StatusBroadcaster::default();

        let (sync, engine) = create_sync_engine(
            config.sync.clone(),
            store.clone(),
            backend.remote.clone(),
            connectivity.clone(),
            status.clone(),
            backend.notifier,
        );
        let engine = tokio::spawn(engine.run());

        let ctx = ServiceContext {
            remote: backend.remote,
            cache: cache.clone(),
            connectivity: connectivity.clone(),
            sync: sync.clone(),
        };
        let services = Services::new(&ctx, backend.objects, &config.cloud.photo_bucket);
        let aggregator = Arc::new(ProgressAggregator::new(ctx, config.rules.clone()));
        let changes = ChangeApplier::new(cache.clone(), aggregator.clone());

        info!(
            "hardline context started (data: {}, backend: {})",
            config.data_path.display(),
            config.cloud.api_base_url
        );

        Ok(Self {
            config,
            store,
            cache,
            connectivity,
            status,
            sync,
            services,
            aggregator,
            changes,
            engine,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn sync(&self) -> &SyncHandle {
        &self.sync
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn aggregator(&self) -> &Arc<ProgressAggregator> {
        &self.aggregator
    }

    pub fn status(&self) -> SyncStatus {
        self.status.current()
    }

    pub async fn daily(&self, challenge_id: &ChallengeId, date: NaiveDate) -> AggregationResult {
        self.aggregator.daily(challenge_id, date).await
    }

    /// Folds a realtime push into the cache. Returns whether it was applied.
    pub fn apply_remote_change(&self, change: &RemoteChange) -> bool {
        self.changes.apply(change)
    }

    /// Stops the sync engine after its current cycle and waits for it to exit.
    pub async fn shutdown(self) -> Result<()> {
        if let Err(e) = self.sync.stop().await {
            warn!("sync engine already stopped: {e}");
        }
        self.engine.await.context("sync engine task failed")?;
        info!("hardline context stopped");
        Ok(())
    }
}
