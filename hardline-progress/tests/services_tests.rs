mod support;

use hardline_cloud::ObjectStorage;
use hardline_progress::{
    DailyProgressService, NoteService, PhotoService, ProgressError, WalkService,
    WaterIntakeService, WorkoutService,
};
use hardline_types::{MutationAction, TaskKind};
use pretty_assertions::assert_eq;
use serde_json::json;
use support::{challenge, day, Fixture};

// --- Daily progress ---

#[tokio::test]
async fn set_task_creates_record_with_single_flag() {
    let f = Fixture::new(true);
    let service = DailyProgressService::new(f.ctx.clone());
    let progress = service
        .set_task(&challenge(), day(), TaskKind::Diet, true)
        .await
        .unwrap();

    assert_eq!(progress.flag(TaskKind::Diet), Some(true));
    assert_eq!(progress.flag(TaskKind::Reading), None);

    let row = f.remote.row("daily_progress", &progress.id).unwrap();
    assert_eq!(row["diet_completed"], true);
    assert!(row.get("reading_completed").is_none());
}

#[tokio::test]
async fn set_task_keeps_other_flags() {
    let f = Fixture::new(true);
    let service = DailyProgressService::new(f.ctx.clone());
    let first = service
        .set_task(&challenge(), day(), TaskKind::Diet, true)
        .await
        .unwrap();
    let second = service
        .set_task(&challenge(), day(), TaskKind::Reading, true)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(second.flag(TaskKind::Diet), Some(true));
    assert_eq!(second.flag(TaskKind::Reading), Some(true));
    assert_eq!(f.remote.rows("daily_progress").len(), 1);
}

#[tokio::test]
async fn set_task_offline_builds_on_cache() {
    let f = Fixture::new(false);
    let service = DailyProgressService::new(f.ctx.clone());
    service
        .set_task(&challenge(), day(), TaskKind::Water, true)
        .await
        .unwrap();
    let progress = service
        .set_task(&challenge(), day(), TaskKind::Water, false)
        .await
        .unwrap();

    assert_eq!(progress.flag(TaskKind::Water), Some(false));
    let actions: Vec<_> = f
        .sync
        .pending()
        .await
        .unwrap()
        .into_iter()
        .map(|i| i.action)
        .collect();
    assert_eq!(actions, vec![MutationAction::Create, MutationAction::Update]);
}

// --- Logs ---

#[tokio::test]
async fn add_water_accumulates() {
    let f = Fixture::new(true);
    let service = WaterIntakeService::new(f.ctx.clone());
    service.add_water(&challenge(), day(), 16.0).await.unwrap();
    let intake = service.add_water(&challenge(), day(), 24.0).await.unwrap();

    assert_eq!(intake.amount_oz, 40.0);
    assert_eq!(f.remote.rows("water_intake").len(), 1);
    assert_eq!(f.remote.row("water_intake", &intake.id).unwrap()["amount_oz"], 40.0);
}

#[tokio::test]
async fn add_water_rejects_non_positive_amounts() {
    let f = Fixture::new(true);
    let service = WaterIntakeService::new(f.ctx.clone());
    for amount in [0.0, -8.0, f64::NAN] {
        let err = service.add_water(&challenge(), day(), amount).await.unwrap_err();
        assert!(matches!(err, ProgressError::InvalidInput(_)));
    }
    assert!(f.remote.calls().is_empty());
}

#[tokio::test]
async fn workouts_append() {
    let f = Fixture::new(true);
    let service = WorkoutService::new(f.ctx.clone());
    service
        .log_workout(&challenge(), day(), "run", 45, true)
        .await
        .unwrap();
    service
        .log_workout(&challenge(), day(), "lift", 50, false)
        .await
        .unwrap();

    let workouts = service.list_for_day(&challenge(), day()).await.unwrap();
    assert_eq!(workouts.len(), 2);
    assert_eq!(service.cached_for_day(&challenge(), day()).len(), 2);
}

#[tokio::test]
async fn walk_logged_offline_is_cached() {
    let f = Fixture::new(false);
    let service = WalkService::new(f.ctx.clone());
    let walk = service
        .log_walk(&challenge(), day(), 50, Some(4.2))
        .await
        .unwrap();
    assert_eq!(service.cached_for_day(&challenge(), day()), vec![walk]);
    assert_eq!(f.sync.pending().await.unwrap().len(), 1);
}

#[tokio::test]
async fn save_note_replaces_content() {
    let f = Fixture::new(true);
    let service = NoteService::new(f.ctx.clone());
    let first = service.save_note(&challenge(), day(), "tired").await.unwrap();
    let second = service
        .save_note(&challenge(), day(), "tired but done")
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(
        f.remote.row("daily_notes", &first.id).unwrap()["content"],
        json!("tired but done")
    );
}

// --- Photos ---

#[tokio::test]
async fn photo_upload_stores_object_and_row() {
    let f = Fixture::new(true);
    let service = PhotoService::new(f.ctx.clone(), f.remote.clone(), "progress-photos");
    let photo = service
        .upload(&challenge(), day(), vec![0xff, 0xd8], "image/jpeg")
        .await
        .unwrap();

    assert!(photo.storage_path.starts_with("c1/2025-03-14/"));
    assert!(photo.storage_path.ends_with(".jpg"));
    assert_eq!(
        photo.public_url,
        f.remote.public_url("progress-photos", &photo.storage_path)
    );
    assert_eq!(
        f.remote.object("progress-photos", &photo.storage_path),
        Some(vec![0xff, 0xd8])
    );
    assert!(f.remote.row("progress_photos", &photo.id).is_some());
}

#[tokio::test]
async fn photo_upload_requires_connection() {
    let f = Fixture::new(false);
    let service = PhotoService::new(f.ctx.clone(), f.remote.clone(), "progress-photos");
    let err = service
        .upload(&challenge(), day(), vec![1], "image/png")
        .await
        .unwrap_err();
    assert!(matches!(err, ProgressError::Offline(_)));
    assert!(f.remote.calls().is_empty());
}

#[tokio::test]
async fn photo_delete_removes_object_and_row() {
    let f = Fixture::new(true);
    let service = PhotoService::new(f.ctx.clone(), f.remote.clone(), "progress-photos");
    let photo = service
        .upload(&challenge(), day(), vec![1, 2], "image/png")
        .await
        .unwrap();

    service.delete(&photo).await.unwrap();
    assert_eq!(f.remote.object("progress-photos", &photo.storage_path), None);
    assert!(f.remote.row("progress_photos", &photo.id).is_none());
    assert!(service.cached_for_day(&challenge(), day()).is_empty());
}
