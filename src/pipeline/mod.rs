//! Pipeline stages for the search rotation.
//!
//! - `diff`: Classify each observed listing against the job's snapshot
//! - `dedup`: Suppress repeated notifications within a time window
//! - `scheduler`: Own the job set and run the poll rotation

pub mod dedup;
pub mod diff;
pub mod scheduler;

pub use dedup::DedupCache;
pub use diff::{ChangeKind, DiffEngine, DiffStats};
pub use scheduler::{CycleReport, JobOutcome, JobState, QueryJob, Scheduler, SchedulerHandle};
