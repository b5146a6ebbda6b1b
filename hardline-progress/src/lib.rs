//! Entity services and daily progress aggregation for Hardline.
//!
//! - [`EntityService`] gives every daily table the same read path (remote when
//!   online, cache when offline) and the same two-phase write path
//! - The specialised services add the operations the UI calls
//! - [`ProgressAggregator`] composes the six sources into one daily view
//! - [`ChangeApplier`] keeps the cache current from realtime pushes

mod aggregate;
mod error;
mod photos;
mod realtime;
mod rules;
mod service;
mod services;

pub use aggregate::{derive_tasks, AggregationResult, ProgressAggregator, TaskCompletion, MEMO_TTL};
pub use error::{ProgressError, ProgressResult};
pub use photos::PhotoService;
pub use realtime::ChangeApplier;
pub use rules::ChallengeRules;
pub use service::{EntityService, ServiceContext};
pub use services::{
    DailyProgressService, NoteService, WalkService, WaterIntakeService, WorkoutService,
};
