mod support;

use chrono::Utc;
use futures::poll;
use hardline_cloud::{FailureKind, MockRemote, RemoteOp};
use hardline_storage::{KvStore, LocalCache};
use hardline_sync::{DrainSkipped, NewMutation, SyncError, SyncQueue};
use hardline_types::{EntityType, MutationAction};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use support::{rollback, water_create, water_key, water_payload, water_update, Harness};

// --- Scenarios ---

#[tokio::test]
async fn offline_update_syncs_when_connectivity_returns() {
    let h = Harness::start(false);
    h.handle.enqueue(water_update("w1", 64.0)).await.unwrap();

    let status = h.handle.status().await.unwrap();
    assert_eq!(status.pending_count, 1);
    assert!(!status.is_online);
    assert_eq!(h.remote.write_count("water_intake"), 0);

    h.connectivity.set_online(true);
    let status = h.wait_idle(0).await;

    assert!(status.is_online);
    assert!(status.last_sync_at.is_some());
    assert_eq!(h.remote.row("water_intake", "w1").unwrap()["amount_oz"], 64.0);
    assert_eq!(h.notifier.count(), 0);
}

#[tokio::test]
async fn create_conflict_drains_as_update() {
    let remote = Arc::new(MockRemote::new());
    remote.fail_times(RemoteOp::Insert, "water_intake", FailureKind::UniqueViolation, 1);
    let h = Harness::start_with(KvStore::open_in_memory().unwrap(), remote, true);

    h.handle.enqueue(water_create("dup", 24.0)).await.unwrap();
    let status = h.wait_idle(0).await;

    assert_eq!(status.error_count, 0);
    assert!(status.last_sync_at.is_some());
    assert_eq!(h.remote.call_count(RemoteOp::Upsert, "water_intake"), 1);
    assert!(h.remote.row("water_intake", "dup").is_some());
    assert_eq!(h.notifier.count(), 0);
}

// --- Retry cap ---

#[tokio::test]
async fn dropped_after_exactly_three_failures() {
    let h = Harness::start(true);
    h.remote
        .fail_always(RemoteOp::Upsert, "water_intake", FailureKind::Server(500));

    let item = h.handle.enqueue(water_update("w1", 64.0)).await.unwrap();
    h.wait_until(|s| !s.is_syncing && s.error_count == 1).await;

    let second = h.handle.flush().await.unwrap();
    assert_eq!(second.failed, 1);
    assert_eq!(second.rejected, 0);
    assert_eq!(second.dropped, 0);
    assert_eq!(h.handle.pending().await.unwrap()[0].retry_count, 2);

    let third = h.handle.flush().await.unwrap();
    assert_eq!(third.dropped, 1);
    assert_eq!(third.remaining, 0);

    let fourth = h.handle.flush().await.unwrap();
    assert_eq!(fourth.skipped, Some(DrainSkipped::Empty));

    assert_eq!(h.remote.call_count(RemoteOp::Upsert, "water_intake"), 3);
    assert_eq!(h.notifier.ids(), vec![item.id]);
    let status = h.handle.status().await.unwrap();
    assert_eq!(status.last_sync_at, None);
    assert_eq!(status.error_count, 0);
}

#[tokio::test]
async fn rejected_write_is_reported_apart_from_transient_ones() {
    let h = Harness::start(false);
    h.remote
        .fail_always(RemoteOp::Upsert, "water_intake", FailureKind::Unauthorized);
    h.remote
        .fail_always(RemoteOp::Delete, "water_intake", FailureKind::Network);
    h.handle.enqueue(water_update("w1", 64.0)).await.unwrap();
    h.handle
        .enqueue(NewMutation::new(
            EntityType::WaterIntake,
            MutationAction::Delete,
            json!({"id": "w2"}),
        ))
        .await
        .unwrap();

    h.connectivity.set_online(true);
    let report = h.handle.flush().await.unwrap();
    assert_eq!(report.failed, 2);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.remaining, 2);
}

#[tokio::test]
async fn retryable_failure_keeps_optimistic_value() {
    let h = Harness::start(true);
    let cache = LocalCache::new(h.store.clone());
    cache.put(&water_key(), json!([water_payload("w1", 64.0)]));
    h.remote
        .fail_times(RemoteOp::Upsert, "water_intake", FailureKind::Network, 1);

    let mutation = water_update("w1", 64.0).with_rollback(rollback("w1", None));
    h.handle.enqueue(mutation).await.unwrap();
    h.wait_until(|s| !s.is_syncing && s.error_count == 1).await;

    assert_eq!(cache.get(&water_key()).unwrap().value[0]["amount_oz"], 64.0);
}

#[tokio::test]
async fn drop_restores_previous_record() {
    let h = Harness::start(true);
    h.remote
        .fail_always(RemoteOp::Upsert, "water_intake", FailureKind::Server(502));
    let cache = LocalCache::new(h.store.clone());
    cache.put(
        &water_key(),
        json!([water_payload("w1", 64.0), water_payload("w2", 8.0)]),
    );

    let mutation = water_update("w1", 64.0)
        .with_rollback(rollback("w1", Some(water_payload("w1", 16.0))));
    h.handle.enqueue(mutation).await.unwrap();
    h.wait_until(|s| !s.is_syncing && s.error_count == 1).await;
    h.handle.flush().await.unwrap();
    h.handle.flush().await.unwrap();

    assert_eq!(
        cache.get(&water_key()).unwrap().value,
        json!([water_payload("w1", 16.0), water_payload("w2", 8.0)])
    );
    assert_eq!(h.notifier.count(), 1);
}

#[tokio::test]
async fn drop_of_new_record_removes_it() {
    let h = Harness::start(true);
    h.remote
        .fail_always(RemoteOp::Insert, "water_intake", FailureKind::Server(500));
    let cache = LocalCache::new(h.store.clone());
    cache.put(&water_key(), json!([water_payload("w1", 8.0)]));

    let mutation = water_create("w1", 8.0).with_rollback(rollback("w1", None));
    h.handle.enqueue(mutation).await.unwrap();
    h.wait_until(|s| !s.is_syncing && s.error_count == 1).await;
    h.handle.flush().await.unwrap();
    h.handle.flush().await.unwrap();

    assert_eq!(cache.get(&water_key()).unwrap().value, json!([]));
}

#[tokio::test]
async fn chained_writes_of_one_record_roll_back_to_last_synced_value() {
    let h = Harness::start(false);
    let cache = LocalCache::new(h.store.clone());
    cache.put(&water_key(), json!([water_payload("w1", 24.0)]));

    h.handle
        .enqueue(water_create("w1", 24.0).with_rollback(rollback("w1", None)))
        .await
        .unwrap();
    h.handle
        .enqueue(
            water_update("w1", 24.0)
                .with_rollback(rollback("w1", Some(water_payload("w1", 8.0)))),
        )
        .await
        .unwrap();
    h.remote
        .fail_always(RemoteOp::Select, "water_intake", FailureKind::Server(500));
    h.remote
        .fail_always(RemoteOp::Upsert, "water_intake", FailureKind::Server(500));

    h.connectivity.set_online(true);
    h.wait_until(|s| !s.is_syncing && s.error_count == 2).await;
    h.handle.flush().await.unwrap();
    let last = h.handle.flush().await.unwrap();

    assert_eq!(last.dropped, 2);
    assert_eq!(cache.get(&water_key()).unwrap().value, json!([]));
    assert_eq!(h.notifier.count(), 2);
}

// --- Drain exclusivity ---

#[tokio::test]
async fn no_second_drain_while_one_is_in_flight() {
    let h = Harness::start(true);
    h.remote.hold();

    h.handle.enqueue(water_update("a", 1.0)).await.unwrap();
    h.handle.drain().await.unwrap();
    h.handle.set_visible(false).await.unwrap();
    h.handle.set_visible(true).await.unwrap();
    h.handle.enqueue(water_update("b", 2.0)).await.unwrap();
    h.handle.drain().await.unwrap();

    let status = h.handle.status().await.unwrap();
    assert!(status.is_syncing);
    assert_eq!(status.pending_count, 2);
    assert_eq!(h.remote.call_count(RemoteOp::Upsert, "water_intake"), 1);

    h.remote.release();
    // Items enqueued during a drain wait for the next trigger.
    h.wait_idle(1).await;
    assert!(h.remote.row("water_intake", "a").is_some());
    assert!(h.remote.row("water_intake", "b").is_none());

    let report = h.handle.flush().await.unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(h.remote.call_count(RemoteOp::Upsert, "water_intake"), 2);
}

#[tokio::test]
async fn flush_joins_the_running_cycle() {
    let h = Harness::start(true);
    h.remote.hold();
    h.handle.enqueue(water_update("a", 1.0)).await.unwrap();

    let flush = h.handle.flush();
    tokio::pin!(flush);
    assert!(poll!(&mut flush).is_pending());
    // Commands are handled in order: once this returns the flush has joined.
    h.handle.status().await.unwrap();
    h.remote.release();

    let report = flush.await.unwrap();
    assert_eq!(report.attempted, 1);
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.skipped, None);
}

#[tokio::test]
async fn flush_while_offline_is_skipped() {
    let h = Harness::start(false);
    h.handle.enqueue(water_update("a", 1.0)).await.unwrap();
    let report = h.handle.flush().await.unwrap();
    assert_eq!(report.skipped, Some(DrainSkipped::Offline));
    assert_eq!(report.remaining, 1);
    assert!(h.remote.calls().is_empty());
}

#[tokio::test]
async fn enqueue_during_drain_is_persisted() {
    let h = Harness::start(true);
    h.remote.hold();
    h.handle.enqueue(water_update("a", 1.0)).await.unwrap();
    h.handle.enqueue(water_update("b", 2.0)).await.unwrap();

    assert_eq!(SyncQueue::load(h.store.clone()).len(), 2);
    h.remote.release();
}

// --- Triggers ---

#[tokio::test]
async fn regaining_visibility_triggers_drain() {
    let h = Harness::start(true);
    h.remote
        .fail_times(RemoteOp::Upsert, "water_intake", FailureKind::Network, 1);
    h.handle.enqueue(water_update("a", 1.0)).await.unwrap();
    h.wait_until(|s| !s.is_syncing && s.error_count == 1).await;

    // Already visible: no drain.
    h.handle.set_visible(true).await.unwrap();
    h.handle.status().await.unwrap();
    assert_eq!(h.remote.call_count(RemoteOp::Upsert, "water_intake"), 1);

    h.handle.set_visible(false).await.unwrap();
    h.handle.set_visible(true).await.unwrap();
    h.wait_idle(0).await;
    assert_eq!(h.remote.call_count(RemoteOp::Upsert, "water_intake"), 2);
}

#[tokio::test]
async fn hidden_app_still_drains_on_enqueue() {
    let h = Harness::start(true);
    h.handle.set_visible(false).await.unwrap();
    h.handle.enqueue(water_update("a", 1.0)).await.unwrap();
    h.wait_idle(0).await;
    assert!(h.remote.row("water_intake", "a").is_some());
}

#[tokio::test(start_paused = true)]
async fn periodic_timer_retries_failed_items() {
    let h = Harness::start(true);
    h.remote
        .fail_times(RemoteOp::Upsert, "water_intake", FailureKind::Server(503), 1);
    let started = tokio::time::Instant::now();

    h.handle.enqueue(water_update("a", 1.0)).await.unwrap();
    h.wait_until(|s| !s.is_syncing && s.error_count == 1).await;
    assert_eq!(h.remote.call_count(RemoteOp::Upsert, "water_intake"), 1);

    h.wait_idle(0).await;
    assert!(started.elapsed() >= std::time::Duration::from_secs(30));
    assert_eq!(h.remote.call_count(RemoteOp::Upsert, "water_intake"), 2);
}

#[tokio::test]
async fn going_offline_stops_automatic_drains() {
    let h = Harness::start(true);
    h.connectivity.set_online(false);
    h.wait_until(|s| !s.is_online).await;
    h.handle.enqueue(water_update("a", 1.0)).await.unwrap();
    h.handle.drain().await.unwrap();
    assert_eq!(h.handle.status().await.unwrap().pending_count, 1);
    assert!(h.remote.calls().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn quick_offline_online_flap_still_drains() {
    let h = Harness::start(true);
    for n in 0..50 {
        h.connectivity.set_online(false);
        h.handle
            .enqueue(water_update(&format!("w{n}"), 1.0))
            .await
            .unwrap();
        h.connectivity.set_online(true);
        // Well under the periodic interval, so only the online report drains.
        tokio::time::timeout(std::time::Duration::from_secs(5), h.wait_idle(0))
            .await
            .unwrap_or_else(|_| panic!("flap {n} left the queue undrained"));
    }
    assert_eq!(h.remote.rows("water_intake").len(), 50);
}

// --- Persistence and reconcile ---

#[tokio::test]
async fn queue_survives_engine_restart() {
    let store = KvStore::open_in_memory().unwrap();
    let remote = Arc::new(MockRemote::new());

    let first = Harness::start_with(store.clone(), remote.clone(), false);
    first.handle.enqueue(water_update("a", 1.0)).await.unwrap();
    first.stop().await;

    let second = Harness::start_with(store, remote, true);
    second.wait_idle(0).await;
    assert!(second.remote.row("water_intake", "a").is_some());
}

#[tokio::test]
async fn reconciles_queue_written_by_another_handle() {
    let h = Harness::start(false);
    let mut other_tab = SyncQueue::load(h.store.attach());
    other_tab.push(water_update("from-other-tab", 3.0));

    let status = h.wait_until(|s| s.pending_count == 1).await;
    assert_eq!(status.pending_count, 1);
    let pending = h.handle.pending().await.unwrap();
    assert_eq!(pending[0].record_id(), Some("from-other-tab"));
}

#[tokio::test]
async fn last_sync_time_from_another_handle_is_adopted() {
    let h = Harness::start(false);
    let mut other_tab = SyncQueue::load(h.store.attach());
    let at = Utc::now();
    other_tab.mark_synced(at);

    let status = h.wait_until(|s| s.last_sync_at.is_some()).await;
    assert_eq!(status.last_sync_at, Some(at));
}

// --- Lifecycle ---

#[tokio::test]
async fn stop_waits_for_in_flight_cycle() {
    let h = Harness::start(true);
    h.remote.hold();
    h.handle.enqueue(water_update("a", 1.0)).await.unwrap();

    let handle = h.handle.clone();
    let stop = handle.stop();
    tokio::pin!(stop);
    assert!(poll!(&mut stop).is_pending());
    h.remote.release();
    stop.await.unwrap();
    h.task.await.unwrap();

    assert!(SyncQueue::load(h.store.clone()).is_empty());
    assert!(matches!(
        h.handle.status().await,
        Err(SyncError::EngineStopped)
    ));
}

#[tokio::test]
async fn status_listener_sees_sync_lifecycle() {
    let h = Harness::start(true);
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let _sub = {
        let seen = seen.clone();
        h.handle
            .subscribe(move |s| seen.lock().unwrap().push((s.is_syncing, s.pending_count)))
    };

    h.handle.enqueue(water_update("a", 1.0)).await.unwrap();
    h.wait_idle(0).await;
    h.handle.status().await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen.first(), Some(&(false, 0)));
    assert!(seen.contains(&(true, 1)));
    assert_eq!(seen.last(), Some(&(false, 0)));
}

#[tokio::test]
async fn delete_mutation_for_missing_row_clears_queue() {
    let h = Harness::start(true);
    let mutation = hardline_sync::NewMutation::new(
        EntityType::Walk,
        MutationAction::Delete,
        json!({"id": "gone"}),
    );
    h.handle.enqueue(mutation).await.unwrap();
    let status = h.wait_idle(0).await;
    assert_eq!(status.error_count, 0);
    assert_eq!(h.notifier.count(), 0);
}
