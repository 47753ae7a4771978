#![warn(clippy::unwrap_used, clippy::expect_used)]
//! Adaptive control loop: per-topic mastery (moving average or Bayesian
//! knowledge tracing), mastery → difficulty mapping and session scheduling.
//!
//! All types are plain synchronous state machines. Callers own one tracker
//! and one scheduler per learner session and persist [`TrackerSnapshot`]s
//! themselves.

mod bkt;
mod difficulty;
mod error;
mod mastery;
mod scheduler;
mod telemetry;
mod tracker;

pub use bkt::{
    BktParameters, BktSnapshot, BktTracker, DEFAULT_GUESS, DEFAULT_LEARN, DEFAULT_PRIOR,
    DEFAULT_SLIP, MASTERED_AT,
};
pub use difficulty::{DifficultyMapper, DifficultyMapping, DifficultyZone};
pub use error::{AdaptiveError, Result};
pub use mastery::{
    fluency_factor, MasteryLevel, MasteryRecord, MasteryTracker, TopicSummary, TrackerSnapshot,
    DEFAULT_ALPHA, INITIAL_MASTERY, MAX_HISTORY,
};
pub use scheduler::{AdaptiveScheduler, SchedulerState, Strategy};
pub use tracker::KnowledgeTracker;
