use crate::error::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the six daily tasks of the challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Diet,
    Workout,
    OutdoorWalk,
    Water,
    Reading,
    Photo,
}

impl TaskKind {
    pub const ALL: [TaskKind; 6] = [
        TaskKind::Diet,
        TaskKind::Workout,
        TaskKind::OutdoorWalk,
        TaskKind::Water,
        TaskKind::Reading,
        TaskKind::Photo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Diet => "diet",
            TaskKind::Workout => "workout",
            TaskKind::OutdoorWalk => "outdoor_walk",
            TaskKind::Water => "water",
            TaskKind::Reading => "reading",
            TaskKind::Photo => "photo",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| TypeError::UnknownTask(s.to_string()))
    }
}
