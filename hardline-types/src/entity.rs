use crate::error::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical entity a cached record or queued mutation belongs to.
///
/// Each entity maps to exactly one remote table; the tag doubles as the
/// cache key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    DailyProgress,
    WaterIntake,
    #[serde(rename = "workouts")]
    Workout,
    #[serde(rename = "walks")]
    Walk,
    #[serde(rename = "progress_photos")]
    ProgressPhoto,
    #[serde(rename = "daily_notes")]
    DailyNote,
}

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::DailyProgress,
        EntityType::WaterIntake,
        EntityType::Workout,
        EntityType::Walk,
        EntityType::ProgressPhoto,
        EntityType::DailyNote,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::DailyProgress => "daily_progress",
            EntityType::WaterIntake => "water_intake",
            EntityType::Workout => "workouts",
            EntityType::Walk => "walks",
            EntityType::ProgressPhoto => "progress_photos",
            EntityType::DailyNote => "daily_notes",
        }
    }

    /// Remote table holding rows of this entity.
    pub fn table(&self) -> &'static str {
        self.as_str()
    }

    /// Looks up the entity stored in a remote table.
    pub fn from_table(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.table() == table)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| TypeError::UnknownEntity(s.to_string()))
    }
}

/// Kind of mutation replayed against a remote table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationAction {
    Create,
    Update,
    Delete,
}

impl MutationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationAction::Create => "create",
            MutationAction::Update => "update",
            MutationAction::Delete => "delete",
        }
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MutationAction {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(MutationAction::Create),
            "update" => Ok(MutationAction::Update),
            "delete" => Ok(MutationAction::Delete),
            other => Err(TypeError::UnknownAction(other.to_string())),
        }
    }
}
