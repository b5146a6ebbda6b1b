//! Sync engine: the single owner of the sync queue.
//!
//! Main event loop that coordinates:
//! - Commands from [`SyncHandle`] (enqueue, drain, flush, visibility, status, stop)
//! - Periodic drain attempts on a fixed interval
//! - Offline to online transitions
//! - Queue changes persisted by another handle on the same storage
//!
//! A drain replays a snapshot of the queue in a spawned task which streams one
//! outcome per item back to the loop. Enqueues keep being accepted and
//! persisted while a drain is in flight, and at most one drain runs at a time.

use crate::config::SyncConfig;
use crate::connectivity::Connectivity;
use crate::error::{SyncError, SyncResult};
use crate::notifier::Notifier;
use crate::queue::{FailureOutcome, NewMutation, QueueItem, SyncQueue};
use crate::replay::replay;
use crate::status::{StatusBroadcaster, Subscription, SyncStatus};

use chrono::Utc;
use hardline_cloud::{RemoteResult, RemoteStore};
use hardline_storage::{KvStore, LocalCache, StorageChange, LAST_SYNC_KEY, QUEUE_KEY};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Why a drain did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainSkipped {
    AlreadyDraining,
    Offline,
    Empty,
}

/// Summary of one drain cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Items in the snapshot taken when the cycle started.
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failures the remote refused outright rather than could not reach.
    pub rejected: usize,
    /// Failed items that reached the retry cap and were removed.
    pub dropped: usize,
    /// Queue length when the cycle ended, including items enqueued meanwhile.
    pub remaining: usize,
    pub skipped: Option<DrainSkipped>,
}

impl DrainReport {
    fn skipped(reason: DrainSkipped, remaining: usize) -> Self {
        Self {
            remaining,
            skipped: Some(reason),
            ..Self::default()
        }
    }
}

enum SyncCommand {
    Enqueue {
        mutation: NewMutation,
        reply: oneshot::Sender<QueueItem>,
    },
    Drain,
    Flush {
        reply: oneshot::Sender<DrainReport>,
    },
    SetVisible(bool),
    Status {
        reply: oneshot::Sender<SyncStatus>,
    },
    Pending {
        reply: oneshot::Sender<Vec<QueueItem>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
}

struct ItemOutcome {
    id: Uuid,
    result: RemoteResult<()>,
}

struct DrainCycle {
    outcomes: mpsc::UnboundedReceiver<ItemOutcome>,
    report: DrainReport,
    waiters: Vec<oneshot::Sender<DrainReport>>,
}

/// Sync engine main loop. Create with [`create_sync_engine`] and spawn [`run`](Self::run).
pub struct SyncEngine {
    config: SyncConfig,
    queue: SyncQueue,
    store: KvStore,
    cache: LocalCache,
    remote: Arc<dyn RemoteStore>,
    notifier: Arc<dyn Notifier>,
    connectivity: Connectivity,
    status: StatusBroadcaster,
    command_rx: mpsc::Receiver<SyncCommand>,
    online_rx: watch::Receiver<bool>,
    storage_rx: broadcast::Receiver<StorageChange>,
    online: bool,
    visible: bool,
    cycle: Option<DrainCycle>,
}

/// Handle for sending commands to the sync engine.
#[derive(Clone)]
pub struct SyncHandle {
    command_tx: mpsc::Sender<SyncCommand>,
    status: StatusBroadcaster,
    connectivity: Connectivity,
}

impl SyncHandle {
    /// Queues a mutation. Starts a drain right away when online and idle.
    pub async fn enqueue(&self, mutation: NewMutation) -> SyncResult<QueueItem> {
        let (reply, rx) = oneshot::channel();
        self.send(SyncCommand::Enqueue { mutation, reply }).await?;
        rx.await.map_err(|_| SyncError::EngineStopped)
    }

    /// Requests a drain without waiting for it.
    pub async fn drain(&self) -> SyncResult<()> {
        self.send(SyncCommand::Drain).await
    }

    /// Drains and waits for the cycle to finish. Joins a cycle already in flight.
    pub async fn flush(&self) -> SyncResult<DrainReport> {
        let (reply, rx) = oneshot::channel();
        self.send(SyncCommand::Flush { reply }).await?;
        rx.await.map_err(|_| SyncError::EngineStopped)
    }

    /// Reports page visibility. Becoming visible while online triggers a drain.
    pub async fn set_visible(&self, visible: bool) -> SyncResult<()> {
        self.send(SyncCommand::SetVisible(visible)).await
    }

    pub async fn status(&self) -> SyncResult<SyncStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(SyncCommand::Status { reply }).await?;
        rx.await.map_err(|_| SyncError::EngineStopped)
    }

    /// Items currently queued, in enqueue order.
    pub async fn pending(&self) -> SyncResult<Vec<QueueItem>> {
        let (reply, rx) = oneshot::channel();
        self.send(SyncCommand::Pending { reply }).await?;
        rx.await.map_err(|_| SyncError::EngineStopped)
    }

    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncStatus) + Send + Sync + 'static,
    {
        self.status.subscribe(listener)
    }

    pub fn watch_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.watch()
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    /// Stops the engine once the current drain cycle, if any, has been applied.
    pub async fn stop(&self) -> SyncResult<()> {
        let (reply, rx) = oneshot::channel();
        self.send(SyncCommand::Stop { reply }).await?;
        rx.await.map_err(|_| SyncError::EngineStopped)
    }

    async fn send(&self, cmd: SyncCommand) -> SyncResult<()> {
        self.command_tx
            .send(cmd)
            .await
            .map_err(|_| SyncError::EngineStopped)
    }
}

/// Creates a sync engine and its command handle.
///
/// The queue is loaded from `store` immediately; the returned engine must be
/// spawned for commands to be processed.
pub fn create_sync_engine(
    config: SyncConfig,
    store: KvStore,
    remote: Arc<dyn RemoteStore>,
    connectivity: Connectivity,
    status: StatusBroadcaster,
    notifier: Arc<dyn Notifier>,
) -> (SyncHandle, SyncEngine) {
    let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));

    let handle = SyncHandle {
        command_tx,
        status: status.clone(),
        connectivity: connectivity.clone(),
    };

    let mut online_rx = connectivity.subscribe();
    let online = *online_rx.borrow_and_update();

    let engine = SyncEngine {
        queue: SyncQueue::load(store.clone()),
        cache: LocalCache::new(store.clone()),
        storage_rx: store.subscribe(),
        config,
        store,
        remote,
        notifier,
        connectivity,
        status,
        command_rx,
        online_rx,
        online,
        visible: true,
        cycle: None,
    };
    engine.publish_status();

    (handle, engine)
}

impl SyncEngine {
    /// Runs the engine event loop until stopped or every handle is dropped.
    pub async fn run(mut self) {
        info!("sync engine started with {} pending item(s)", self.queue.len());

        let mut ticker = tokio::time::interval(self.config.drain_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip first immediate tick
        ticker.tick().await;

        let mut online_open = true;
        let mut storage_open = true;

        let _ = self.start_drain();

        loop {
            tokio::select! {
                outcome = next_outcome(&mut self.cycle) => match outcome {
                    Some(outcome) => self.apply_outcome(outcome),
                    None => self.finish_cycle(),
                },
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => {
                        if !self.handle_command(cmd).await {
                            break;
                        }
                    }
                    None => {
                        info!("command channel closed, stopping sync engine");
                        self.wind_down().await;
                        break;
                    }
                },
                _ = ticker.tick() => {
                    let _ = self.start_drain();
                }
                changed = self.online_rx.changed(), if online_open => match changed {
                    Ok(()) => {
                        let online = *self.online_rx.borrow_and_update();
                        self.on_connectivity(online);
                    }
                    Err(_) => online_open = false,
                },
                change = self.storage_rx.recv(), if storage_open => match change {
                    Ok(change) => self.on_storage_change(change),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        debug!("missed {missed} storage notification(s), reconciling");
                        self.reconcile();
                    }
                    Err(broadcast::error::RecvError::Closed) => storage_open = false,
                },
            }
        }

        info!("sync engine stopped");
    }

    /// Returns false when the engine should stop.
    async fn handle_command(&mut self, cmd: SyncCommand) -> bool {
        match cmd {
            SyncCommand::Enqueue { mutation, reply } => {
                let item = self.queue.push(mutation);
                self.publish_status();
                let _ = self.start_drain();
                let _ = reply.send(item);
            }
            SyncCommand::Drain => {
                let _ = self.start_drain();
            }
            SyncCommand::Flush { reply } => {
                if self.cycle.is_none() {
                    if let Err(reason) = self.start_drain() {
                        let _ = reply.send(DrainReport::skipped(reason, self.queue.len()));
                        return true;
                    }
                }
                if let Some(cycle) = self.cycle.as_mut() {
                    cycle.waiters.push(reply);
                }
            }
            SyncCommand::SetVisible(visible) => {
                let regained = visible && !self.visible;
                self.visible = visible;
                if regained {
                    debug!("became visible");
                    let _ = self.start_drain();
                }
            }
            SyncCommand::Status { reply } => {
                let _ = reply.send(self.current_status());
            }
            SyncCommand::Pending { reply } => {
                let _ = reply.send(self.queue.snapshot());
            }
            SyncCommand::Stop { reply } => {
                info!("sync engine stopping");
                self.wind_down().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn start_drain(&mut self) -> Result<(), DrainSkipped> {
        if self.cycle.is_some() {
            debug!("drain already in progress");
            return Err(DrainSkipped::AlreadyDraining);
        }
        if !self.connectivity.is_online() {
            return Err(DrainSkipped::Offline);
        }
        if self.queue.is_empty() {
            return Err(DrainSkipped::Empty);
        }

        let snapshot = self.queue.snapshot();
        info!("draining {} queued item(s)", snapshot.len());

        let (tx, rx) = mpsc::unbounded_channel();
        let report = DrainReport {
            attempted: snapshot.len(),
            ..DrainReport::default()
        };
        let remote = self.remote.clone();
        tokio::spawn(async move {
            for item in snapshot {
                let result = replay(remote.as_ref(), &item).await;
                if tx.send(ItemOutcome { id: item.id, result }).is_err() {
                    break;
                }
            }
        });

        self.cycle = Some(DrainCycle {
            outcomes: rx,
            report,
            waiters: Vec::new(),
        });
        self.publish_status();
        Ok(())
    }

    fn apply_outcome(&mut self, outcome: ItemOutcome) {
        let Some(cycle) = self.cycle.as_mut() else {
            return;
        };

        match outcome.result {
            Ok(()) => {
                cycle.report.succeeded += 1;
                if self.queue.resolve(outcome.id).is_some() {
                    debug!("synced {}", outcome.id);
                }
            }
            Err(e) => {
                cycle.report.failed += 1;
                let transient = e.is_transient();
                if !transient {
                    cycle.report.rejected += 1;
                }
                let reason = e.to_string();
                match self
                    .queue
                    .record_failure(outcome.id, reason.clone(), self.config.max_retries)
                {
                    FailureOutcome::Retrying(attempts) if transient => {
                        warn!(
                            "sync of {} failed (attempt {attempts}/{}): {reason}",
                            outcome.id, self.config.max_retries
                        );
                    }
                    FailureOutcome::Retrying(attempts) => {
                        error!(
                            "remote rejected {} (attempt {attempts}/{}): {reason}",
                            outcome.id, self.config.max_retries
                        );
                    }
                    FailureOutcome::Dropped(item) => {
                        cycle.report.dropped += 1;
                        self.drop_item(&item, &reason);
                    }
                    FailureOutcome::Missing => {
                        debug!("{} left the queue while replaying", outcome.id);
                    }
                }
            }
        }
        self.publish_status();
    }

    fn drop_item(&mut self, item: &QueueItem, reason: &str) {
        error!(
            "dropping {} {} ({}) after {} failed attempts: {reason}",
            item.action, item.entity_type, item.id, item.retry_count
        );
        if let Some(rollback) = &item.rollback {
            if self.queue.hand_over_rollback(item) {
                debug!(
                    "{} has a later queued write, leaving its cached value",
                    rollback.record_id
                );
            } else {
                self.cache.restore_record(
                    &rollback.cache_key,
                    &rollback.record_id,
                    rollback.previous.clone(),
                );
            }
        }
        self.notifier.sync_failed(item, reason);
    }

    fn finish_cycle(&mut self) {
        let Some(mut cycle) = self.cycle.take() else {
            return;
        };
        cycle.report.remaining = self.queue.len();
        if cycle.report.failed == 0 {
            self.queue.mark_synced(Utc::now());
        }

        let report = cycle.report;
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            rejected = report.rejected,
            dropped = report.dropped,
            remaining = report.remaining,
            "drain finished"
        );
        self.publish_status();
        for waiter in cycle.waiters {
            let _ = waiter.send(report.clone());
        }
    }

    /// Applies the outcomes of an in-flight drain, then persists.
    async fn wind_down(&mut self) {
        while self.cycle.is_some() {
            match next_outcome(&mut self.cycle).await {
                Some(outcome) => self.apply_outcome(outcome),
                None => self.finish_cycle(),
            }
        }
        if let Err(e) = self.queue.persist() {
            warn!("failed to persist sync queue on stop: {e}");
        }
    }

    /// The watch channel only keeps the latest value, so an offline/online
    /// flap can arrive as a single `true`. Every online report drains.
    fn on_connectivity(&mut self, online: bool) {
        if online != self.online {
            self.online = online;
            info!("connectivity changed: {}", if online { "online" } else { "offline" });
            self.publish_status();
        }
        if online {
            let _ = self.start_drain();
        }
    }

    fn on_storage_change(&mut self, change: StorageChange) {
        if change.origin == self.store.origin() {
            return;
        }
        if change.key == QUEUE_KEY || change.key == LAST_SYNC_KEY {
            debug!("{} changed in another handle, reconciling", change.key);
            self.reconcile();
        }
    }

    /// Best-effort convergence with the last writer's persisted queue.
    fn reconcile(&mut self) {
        self.queue.reload();
        self.publish_status();
    }

    fn current_status(&self) -> SyncStatus {
        SyncStatus {
            is_online: self.connectivity.is_online(),
            is_syncing: self.cycle.is_some(),
            pending_count: self.queue.len(),
            last_sync_at: self.queue.last_sync_at(),
            error_count: self.queue.error_count(),
        }
    }

    fn publish_status(&self) {
        self.status.publish(self.current_status());
    }
}

/// Next outcome of the running drain; never resolves when idle.
async fn next_outcome(cycle: &mut Option<DrainCycle>) -> Option<ItemOutcome> {
    match cycle {
        Some(cycle) => cycle.outcomes.recv().await,
        None => std::future::pending().await,
    }
}
