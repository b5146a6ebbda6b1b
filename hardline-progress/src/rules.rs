use serde::{Deserialize, Serialize};

/// Thresholds of the challenge's fixed daily task set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeRules {
    /// Daily water goal when the day's log carries none.
    pub water_goal_oz: f64,
    pub workout_min_minutes: u32,
    pub walk_min_minutes: u32,
}

impl Default for ChallengeRules {
    fn default() -> Self {
        Self {
            water_goal_oz: 128.0,
            workout_min_minutes: 45,
            walk_min_minutes: 45,
        }
    }
}
