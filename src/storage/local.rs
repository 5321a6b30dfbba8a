//! Local filesystem storage implementation.
//!
//! A small bucketed key-value store: every record is a JSON file named after
//! the SHA-256 digest of its key, so job ids of any length (with `/`, `?`,
//! `:`) map to short, safe file names. The key itself is stored inside the
//! record and recovered from there when listing a bucket.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── snapshots/
//! │   └── {sha256(job id)}.json   # {"key": .., "value": {listing id: price}}
//! └── jobs/
//!     └── {sha256(job id)}.json   # {"key": .., "value": {"registered_at": ..}}
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Snapshot;
use crate::storage::{JOB_BUCKET, JobMarker, SNAPSHOT_BUCKET, SnapshotStore};

const RECORD_EXTENSION: &str = "json";

/// On-disk envelope pairing a value with the key it was stored under.
#[derive(Serialize)]
struct RecordRef<'a, T: ?Sized> {
    key: &'a str,
    value: &'a T,
}

#[derive(Deserialize)]
struct Record<T> {
    key: String,
    value: T,
}

/// Reads only the key of a record, whatever its value type.
#[derive(Deserialize)]
struct RecordKey {
    key: String,
}

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path of a record. The file name has a fixed length.
    fn path(&self, bucket: &str, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.root_dir
            .join(bucket)
            .join(format!("{}.{}", hex::encode(digest), RECORD_EXTENSION))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(bucket, key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Write JSON data.
    async fn write_json<T: Serialize + ?Sized>(
        &self,
        bucket: &str,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&RecordRef { key, value })?;
        self.write_bytes(bucket, key, &bytes).await
    }

    /// Read bytes, returning None if the record doesn't exist.
    async fn read_bytes(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(bucket, key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, bucket: &str, key: &str) -> Result<Option<T>> {
        let Some(bytes) = self.read_bytes(bucket, key).await? else {
            return Ok(None);
        };
        let record: Record<T> = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::store(key, format!("corrupt record: {e}")))?;
        if record.key != key {
            return Err(AppError::store(
                key,
                format!("record belongs to '{}'", record.key),
            ));
        }
        Ok(Some(record.value))
    }

    /// Remove a record; removing a missing record is not an error.
    async fn remove(&self, bucket: &str, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path(bucket, key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// All keys in a bucket, sorted.
    async fn keys(&self, bucket: &str) -> Result<Vec<String>> {
        let dir = self.root_dir.join(bucket);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            let bytes = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<RecordKey>(&bytes) {
                Ok(record) => keys.push(record.key),
                Err(e) => log::warn!("Skipping unrecognized record {}: {}", path.display(), e),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[async_trait]
impl SnapshotStore for LocalStorage {
    async fn get(&self, job_id: &str) -> Result<Snapshot> {
        Ok(self
            .read_json(SNAPSHOT_BUCKET, job_id)
            .await?
            .unwrap_or_default())
    }

    async fn put(&self, job_id: &str, snapshot: &Snapshot) -> Result<()> {
        self.write_json(SNAPSHOT_BUCKET, job_id, snapshot).await?;
        log::debug!("Stored snapshot for {} ({} listings)", job_id, snapshot.len());
        Ok(())
    }

    async fn delete(&self, job_id: &str) -> Result<()> {
        self.remove(SNAPSHOT_BUCKET, job_id).await?;
        self.remove(JOB_BUCKET, job_id).await
    }

    async fn mark(&self, job_id: &str) -> Result<()> {
        self.write_json(JOB_BUCKET, job_id, &JobMarker::now()).await
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        self.keys(JOB_BUCKET).await
    }
}
