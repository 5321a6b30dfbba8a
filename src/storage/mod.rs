//! Storage abstractions for job persistence.
//!
//! Two buckets are kept per store:
//!
//! ```text
//! {root}/
//! ├── snapshots/   # one record per job id: listing id -> last known price
//! └── jobs/        # one existence marker per registered job id
//! ```
//!
//! Keys are the canonical `chat/query` job ids produced by the query parser.

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Snapshot;

// Re-export for convenience
pub use local::LocalStorage;

/// Bucket holding per-job snapshots.
pub const SNAPSHOT_BUCKET: &str = "snapshots";

/// Bucket holding registered job markers.
pub const JOB_BUCKET: &str = "jobs";

/// Existence marker written when a job is registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobMarker {
    pub registered_at: DateTime<Utc>,
}

impl JobMarker {
    pub fn now() -> Self {
        Self {
            registered_at: Utc::now(),
        }
    }
}

/// Trait for snapshot storage backends.
///
/// Every operation is atomic per key; no multi-key transactions are needed.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load a job's snapshot. A missing record is an empty snapshot, not an error.
    async fn get(&self, job_id: &str) -> Result<Snapshot>;

    /// Replace a job's snapshot.
    async fn put(&self, job_id: &str, snapshot: &Snapshot) -> Result<()>;

    /// Remove a job's snapshot and its registration marker.
    async fn delete(&self, job_id: &str) -> Result<()>;

    /// Record that a job is registered, so it survives restarts.
    async fn mark(&self, job_id: &str) -> Result<()>;

    /// Registered job ids, sorted.
    async fn list_keys(&self) -> Result<Vec<String>>;
}
