//! Per-day records tracked during a challenge.
//!
//! Field names match the remote table columns so records serialize straight
//! into upsert payloads. Optional completion flags are skipped when unset so
//! a partial upsert never clears a flag recorded by another device.

use crate::entity::EntityType;
use crate::task::TaskKind;
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a challenge run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeId(String);

impl ChallengeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChallengeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Generates a time-ordered record id.
pub fn new_record_id() -> String {
    Uuid::now_v7().to_string()
}

/// Formats a date the way the remote tables and cache keys expect it.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// A row stored against one `(challenge, date)` pair.
pub trait DailyRecord: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const ENTITY: EntityType;

    fn id(&self) -> &str;
    fn challenge_id(&self) -> &ChallengeId;
    fn date(&self) -> NaiveDate;
}

macro_rules! daily_record {
    ($ty:ty, $entity:expr) => {
        impl DailyRecord for $ty {
            const ENTITY: EntityType = $entity;

            fn id(&self) -> &str {
                &self.id
            }

            fn challenge_id(&self) -> &ChallengeId {
                &self.challenge_id
            }

            fn date(&self) -> NaiveDate {
                self.date
            }
        }
    };
}

/// Task-completion record for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyProgress {
    pub id: String,
    pub challenge_id: ChallengeId,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diet_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workout_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outdoor_walk_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DailyProgress {
    pub fn new(challenge_id: ChallengeId, date: NaiveDate) -> Self {
        Self {
            id: new_record_id(),
            challenge_id,
            date,
            diet_completed: None,
            workout_completed: None,
            outdoor_walk_completed: None,
            water_completed: None,
            reading_completed: None,
            photo_completed: None,
            updated_at: None,
        }
    }

    /// Returns the explicit completion flag recorded for a task, if any.
    pub fn flag(&self, task: TaskKind) -> Option<bool> {
        match task {
            TaskKind::Diet => self.diet_completed,
            TaskKind::Workout => self.workout_completed,
            TaskKind::OutdoorWalk => self.outdoor_walk_completed,
            TaskKind::Water => self.water_completed,
            TaskKind::Reading => self.reading_completed,
            TaskKind::Photo => self.photo_completed,
        }
    }

    pub fn set_flag(&mut self, task: TaskKind, completed: bool) {
        let slot = match task {
            TaskKind::Diet => &mut self.diet_completed,
            TaskKind::Workout => &mut self.workout_completed,
            TaskKind::OutdoorWalk => &mut self.outdoor_walk_completed,
            TaskKind::Water => &mut self.water_completed,
            TaskKind::Reading => &mut self.reading_completed,
            TaskKind::Photo => &mut self.photo_completed,
        };
        *slot = Some(completed);
    }
}

daily_record!(DailyProgress, EntityType::DailyProgress);

/// Water logged for one day, in fluid ounces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterIntake {
    pub id: String,
    pub challenge_id: ChallengeId,
    pub date: NaiveDate,
    pub amount_oz: f64,
    /// Per-day goal override; the challenge default applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_oz: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

daily_record!(WaterIntake, EntityType::WaterIntake);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: String,
    pub challenge_id: ChallengeId,
    pub date: NaiveDate,
    pub kind: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub outdoor: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

daily_record!(Workout, EntityType::Workout);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Walk {
    pub id: String,
    pub challenge_id: ChallengeId,
    pub date: NaiveDate,
    pub duration_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

daily_record!(Walk, EntityType::Walk);

/// Metadata row for an uploaded progress photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPhoto {
    pub id: String,
    pub challenge_id: ChallengeId,
    pub date: NaiveDate,
    /// Object path inside the photo bucket.
    pub storage_path: String,
    pub public_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

daily_record!(ProgressPhoto, EntityType::ProgressPhoto);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyNote {
    pub id: String,
    pub challenge_id: ChallengeId,
    pub date: NaiveDate,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

daily_record!(DailyNote, EntityType::DailyNote);
