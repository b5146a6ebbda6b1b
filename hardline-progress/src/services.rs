//! Entity services with the operations the UI calls.

use crate::error::{ProgressError, ProgressResult};
use crate::service::{EntityService, ServiceContext};
use chrono::{NaiveDate, Utc};
use hardline_types::{
    new_record_id, ChallengeId, DailyNote, DailyProgress, TaskKind, Walk, WaterIntake, Workout,
};
use std::ops::Deref;

macro_rules! entity_service {
    ($(#[$meta:meta])* $name:ident, $record:ty) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name {
            records: EntityService<$record>,
        }

        impl $name {
            pub fn new(ctx: ServiceContext) -> Self {
                Self {
                    records: EntityService::new(ctx),
                }
            }
        }

        impl Deref for $name {
            type Target = EntityService<$record>;

            fn deref(&self) -> &Self::Target {
                &self.records
            }
        }
    };
}

entity_service!(
    /// Task checklist, one record per day.
    DailyProgressService,
    DailyProgress
);
entity_service!(WaterIntakeService, WaterIntake);
entity_service!(WorkoutService, Workout);
entity_service!(WalkService, Walk);
entity_service!(NoteService, DailyNote);

impl DailyProgressService {
    /// Records an explicit completion flag, keeping the day's other flags.
    pub async fn set_task(
        &self,
        challenge_id: &ChallengeId,
        date: NaiveDate,
        task: TaskKind,
        completed: bool,
    ) -> ProgressResult<DailyProgress> {
        let mut progress = self
            .current_for_day(challenge_id, date)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| DailyProgress::new(challenge_id.clone(), date));
        progress.set_flag(task, completed);
        progress.updated_at = Some(Utc::now());
        self.save(progress).await
    }
}

impl WaterIntakeService {
    /// Adds to the day's logged amount.
    pub async fn add_water(
        &self,
        challenge_id: &ChallengeId,
        date: NaiveDate,
        amount_oz: f64,
    ) -> ProgressResult<WaterIntake> {
        if !amount_oz.is_finite() || amount_oz <= 0.0 {
            return Err(ProgressError::InvalidInput(format!(
                "water amount must be positive, got {amount_oz}"
            )));
        }

        let mut intake = self
            .current_for_day(challenge_id, date)
            .await
            .into_iter()
            .next()
            .unwrap_or_else(|| WaterIntake {
                id: new_record_id(),
                challenge_id: challenge_id.clone(),
                date,
                amount_oz: 0.0,
                goal_oz: None,
                updated_at: None,
            });
        intake.amount_oz += amount_oz;
        intake.updated_at = Some(Utc::now());
        self.save(intake).await
    }
}

impl WorkoutService {
    pub async fn log_workout(
        &self,
        challenge_id: &ChallengeId,
        date: NaiveDate,
        kind: impl Into<String>,
        duration_minutes: u32,
        outdoor: bool,
    ) -> ProgressResult<Workout> {
        self.save(Workout {
            id: new_record_id(),
            challenge_id: challenge_id.clone(),
            date,
            kind: kind.into(),
            duration_minutes,
            outdoor,
            created_at: Some(Utc::now()),
        })
        .await
    }
}

impl WalkService {
    pub async fn log_walk(
        &self,
        challenge_id: &ChallengeId,
        date: NaiveDate,
        duration_minutes: u32,
        distance_km: Option<f64>,
    ) -> ProgressResult<Walk> {
        self.save(Walk {
            id: new_record_id(),
            challenge_id: challenge_id.clone(),
            date,
            duration_minutes,
            distance_km,
            created_at: Some(Utc::now()),
        })
        .await
    }
}

impl NoteService {
    /// Replaces the day's note.
    pub async fn save_note(
        &self,
        challenge_id: &ChallengeId,
        date: NaiveDate,
        content: impl Into<String>,
    ) -> ProgressResult<DailyNote> {
        let content = content.into();
        let note = match self.current_for_day(challenge_id, date).await.into_iter().next() {
            Some(mut note) => {
                note.content = content;
                note
            }
            None => DailyNote {
                id: new_record_id(),
                challenge_id: challenge_id.clone(),
                date,
                content,
                updated_at: None,
            },
        };
        self.save(DailyNote {
            updated_at: Some(Utc::now()),
            ..note
        })
        .await
    }
}
