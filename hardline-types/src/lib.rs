//! Shared domain types for Hardline.
//!
//! Everything that crosses a crate boundary lives here:
//! - Identifiers (`ChallengeId`, record ids)
//! - Entity tags and the remote tables they map to
//! - Mutation actions replayed by the sync queue
//! - The per-day records tracked during a challenge
//! - The fixed daily task set

mod entity;
mod error;
mod records;
mod task;

pub use entity::{EntityType, MutationAction};
pub use error::TypeError;
pub use records::{
    ChallengeId, DailyNote, DailyProgress, DailyRecord, ProgressPhoto, Walk, WaterIntake, Workout,
    format_date, new_record_id,
};
pub use task::TaskKind;
