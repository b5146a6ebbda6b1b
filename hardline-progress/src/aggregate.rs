//! Daily progress aggregation.
//!
//! Composes one view of a `(challenge, date)` from the six per-day sources.
//! Fetches run concurrently and a failing source is treated as absent, so an
//! aggregation always produces a result. Results are memoised for a short
//! window; callers arriving while a fetch is in flight share it.

use crate::rules::ChallengeRules;
use crate::service::{EntityService, ServiceContext};
use chrono::NaiveDate;
use hardline_types::{
    ChallengeId, DailyNote, DailyProgress, DailyRecord, EntityType, ProgressPhoto, TaskKind, Walk,
    WaterIntake, Workout,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use tracing::{debug, warn};

/// How long an aggregation is reused.
pub const MEMO_TTL: Duration = Duration::from_secs(1);

/// Completion of one daily task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskCompletion {
    pub task: TaskKind,
    pub completed: bool,
    /// Whether the value came from a flag on the progress record rather than inference.
    pub explicit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregationResult {
    pub challenge_id: ChallengeId,
    pub date: NaiveDate,
    pub progress: Option<DailyProgress>,
    pub water: Option<WaterIntake>,
    pub workouts: Vec<Workout>,
    pub walks: Vec<Walk>,
    pub photos: Vec<ProgressPhoto>,
    pub note: Option<DailyNote>,
    /// One entry per task, in [`TaskKind::ALL`] order.
    pub tasks: Vec<TaskCompletion>,
    pub tasks_completed: usize,
    pub total_tasks: usize,
    pub completion_ratio: f64,
    pub is_complete: bool,
    /// Sources whose fetch failed and were treated as absent.
    pub failed_sources: Vec<EntityType>,
}

impl AggregationResult {
    pub fn is_task_complete(&self, task: TaskKind) -> bool {
        self.tasks
            .iter()
            .any(|t| t.task == task && t.completed)
    }
}

/// Derives the six task completions. Explicit flags win over inference.
pub fn derive_tasks(
    rules: &ChallengeRules,
    progress: Option<&DailyProgress>,
    water: Option<&WaterIntake>,
    workouts: &[Workout],
    walks: &[Walk],
    photos: &[ProgressPhoto],
) -> Vec<TaskCompletion> {
    TaskKind::ALL
        .into_iter()
        .map(|task| {
            if let Some(completed) = progress.and_then(|p| p.flag(task)) {
                return TaskCompletion {
                    task,
                    completed,
                    explicit: true,
                };
            }
            let completed = match task {
                TaskKind::Water => water.is_some_and(|w| {
                    w.amount_oz >= w.goal_oz.unwrap_or(rules.water_goal_oz)
                }),
                TaskKind::Workout => workouts
                    .iter()
                    .any(|w| w.duration_minutes >= rules.workout_min_minutes),
                TaskKind::OutdoorWalk => walks
                    .iter()
                    .any(|w| w.duration_minutes >= rules.walk_min_minutes),
                TaskKind::Photo => !photos.is_empty(),
                TaskKind::Diet | TaskKind::Reading => false,
            };
            TaskCompletion {
                task,
                completed,
                explicit: false,
            }
        })
        .collect()
}

type MemoKey = (ChallengeId, NaiveDate);

struct MemoEntry {
    created: Instant,
    cell: Arc<OnceCell<AggregationResult>>,
}

pub struct ProgressAggregator {
    progress: EntityService<DailyProgress>,
    water: EntityService<WaterIntake>,
    workouts: EntityService<Workout>,
    walks: EntityService<Walk>,
    photos: EntityService<ProgressPhoto>,
    notes: EntityService<DailyNote>,
    rules: ChallengeRules,
    ttl: Duration,
    memo: Mutex<HashMap<MemoKey, MemoEntry>>,
}

impl ProgressAggregator {
    pub fn new(ctx: ServiceContext, rules: ChallengeRules) -> Self {
        Self {
            progress: EntityService::new(ctx.clone()),
            water: EntityService::new(ctx.clone()),
            workouts: EntityService::new(ctx.clone()),
            walks: EntityService::new(ctx.clone()),
            photos: EntityService::new(ctx.clone()),
            notes: EntityService::new(ctx),
            rules,
            ttl: MEMO_TTL,
            memo: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn rules(&self) -> &ChallengeRules {
        &self.rules
    }

    /// Aggregated view of one day. Never fails; see [`AggregationResult::failed_sources`].
    pub async fn daily(&self, challenge_id: &ChallengeId, date: NaiveDate) -> AggregationResult {
        let cell = {
            let mut memo = self.memo();
            let now = Instant::now();
            // An uninitialised cell is a fetch still in flight; keep it so
            // callers arriving meanwhile join it.
            memo.retain(|_, entry| {
                !entry.cell.initialized() || now.duration_since(entry.created) < self.ttl
            });
            memo.entry((challenge_id.clone(), date))
                .or_insert_with(|| MemoEntry {
                    created: now,
                    cell: Arc::new(OnceCell::new()),
                })
                .cell
                .clone()
        };

        cell.get_or_init(|| self.fetch(challenge_id, date))
            .await
            .clone()
    }

    /// Drops the memoised result for one day.
    pub fn invalidate(&self, challenge_id: &ChallengeId, date: NaiveDate) {
        if self.memo().remove(&(challenge_id.clone(), date)).is_some() {
            debug!("invalidated aggregation for {challenge_id} {date}");
        }
    }

    async fn fetch(&self, challenge_id: &ChallengeId, date: NaiveDate) -> AggregationResult {
        debug!("aggregating {challenge_id} {date}");
        let (progress, water, workouts, walks, photos, notes) = tokio::join!(
            self.progress.list_for_day(challenge_id, date),
            self.water.list_for_day(challenge_id, date),
            self.workouts.list_for_day(challenge_id, date),
            self.walks.list_for_day(challenge_id, date),
            self.photos.list_for_day(challenge_id, date),
            self.notes.list_for_day(challenge_id, date),
        );

        let mut failed_sources = Vec::new();
        let progress = absent_on_error(progress, &mut failed_sources).into_iter().next();
        let water = absent_on_error(water, &mut failed_sources).into_iter().next();
        let workouts = absent_on_error(workouts, &mut failed_sources);
        let walks = absent_on_error(walks, &mut failed_sources);
        let photos = absent_on_error(photos, &mut failed_sources);
        let note = absent_on_error(notes, &mut failed_sources).into_iter().next();

        let tasks = derive_tasks(
            &self.rules,
            progress.as_ref(),
            water.as_ref(),
            &workouts,
            &walks,
            &photos,
        );
        let tasks_completed = tasks.iter().filter(|t| t.completed).count();
        let total_tasks = TaskKind::ALL.len();

        AggregationResult {
            challenge_id: challenge_id.clone(),
            date,
            progress,
            water,
            workouts,
            walks,
            photos,
            note,
            tasks,
            tasks_completed,
            total_tasks,
            completion_ratio: tasks_completed as f64 / total_tasks as f64,
            is_complete: tasks_completed == total_tasks,
            failed_sources,
        }
    }

    fn memo(&self) -> MutexGuard<'_, HashMap<MemoKey, MemoEntry>> {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn absent_on_error<T: DailyRecord>(
    result: crate::error::ProgressResult<Vec<T>>,
    failed: &mut Vec<EntityType>,
) -> Vec<T> {
    match result {
        Ok(records) => records,
        Err(e) => {
            warn!("{} unavailable for aggregation: {e}", T::ENTITY);
            failed.push(T::ENTITY);
            Vec::new()
        }
    }
}
