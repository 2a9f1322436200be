//! Disk Store Module
//!
//! Content-addressed byte store: one flat directory, one file per content hash.
//! Size and modification time are read from filesystem attributes; there is no
//! index or sidecar file.
//!
//! Every filesystem failure is logged and downgraded to a miss or a no-op.
//! All operations on one store are serialized through an async lock, so a
//! maintenance sweep never races with a write to the same file.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::StorageError;
use crate::key::ResourceKey;

// == Disk Record ==
/// A file present in the store directory.
#[derive(Debug, Clone)]
pub struct DiskRecord {
    /// File name: hex content hash of the resource key
    pub hash: String,
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
    /// Size in bytes
    pub size: u64,
}

impl DiskRecord {
    fn is_expired(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        match (now - self.modified).to_std() {
            Ok(age) => age > max_age,
            // Modified in the future: treat as fresh
            Err(_) => false,
        }
    }
}

// == Maintenance Report ==
/// Outcome of one maintenance sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaintenanceReport {
    /// Records deleted because they outlived the max age
    pub expired_removed: usize,
    /// Records deleted to bring the store under the size limit
    pub oversize_removed: usize,
    /// Deletions that failed and will be retried on the next sweep
    pub failures: usize,
    /// Accounted size of the store after the sweep
    pub bytes_remaining: u64,
}

impl MaintenanceReport {
    pub fn removed(&self) -> usize {
        self.expired_removed + self.oversize_removed
    }
}

// == Disk Store ==
/// Handle to a content-addressed directory. Cheap to clone; clones share the
/// same serialization lock.
#[derive(Debug, Clone)]
pub struct DiskStore {
    dir: Arc<PathBuf>,
    size_limit: u64,
    max_age: Duration,
    io_lock: Arc<Mutex<()>>,
}

impl DiskStore {
    // == Constructor ==
    /// Opens (and creates if needed) the store directory.
    ///
    /// A directory that cannot be created is logged; the store still works as
    /// an always-missing tier until the directory becomes writable.
    ///
    /// # Arguments
    /// * `dir` - Flat directory holding one file per content hash
    /// * `size_limit` - Maximum total bytes after a maintenance sweep
    /// * `max_age` - Age after which a record is considered expired
    pub fn new(dir: impl Into<PathBuf>, size_limit: u64, max_age: Duration) -> Self {
        let dir = dir.into();
        if let Err(e) = fs::create_dir_all(&dir) {
            warn!(dir = %dir.display(), error = %e, "Failed to create disk cache directory");
        }
        Self {
            dir: Arc::new(dir),
            size_limit,
            max_age,
            io_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds (or would hold) the bytes for `key`.
    pub fn path_for(&self, key: &ResourceKey) -> PathBuf {
        self.dir.join(key.content_hash())
    }

    // == Put ==
    /// Writes `bytes` to the file addressed by the key's hash, replacing any
    /// previous content and refreshing its modification time.
    ///
    /// Returns whether the write succeeded; failures are already logged.
    pub async fn put(&self, key: &ResourceKey, bytes: Vec<u8>) -> bool {
        let hash = key.content_hash();
        let len = bytes.len();
        let result = self
            .run_blocking(move |dir| write_record(dir, &hash, &bytes))
            .await;

        match result {
            Ok(()) => {
                debug!(key = %key, bytes = len, "Wrote disk record");
                true
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Disk cache write failed");
                false
            }
        }
    }

    // == Get ==
    /// Returns the stored bytes when a present, non-expired record exists.
    ///
    /// Does not evict expired records and does not touch recency.
    pub async fn get(&self, key: &ResourceKey) -> Option<Vec<u8>> {
        let hash = key.content_hash();
        let max_age = self.max_age;
        let result = self
            .run_blocking(move |dir| read_record(dir, &hash, Utc::now(), max_age))
            .await;

        match result {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "Disk cache read failed");
                None
            }
        }
    }

    // == Remove ==
    /// Deletes the record for `key`. Absent records are a no-op.
    pub async fn remove(&self, key: &ResourceKey) {
        let hash = key.content_hash();
        let result = self
            .run_blocking(move |dir| remove_file_if_present(&dir.join(hash)))
            .await;

        if let Err(e) = result {
            warn!(key = %key, error = %e, "Disk cache delete failed");
        }
    }

    // == Clear ==
    /// Deletes every file in the store directory.
    ///
    /// Keeps going after individual failures and reports them in aggregate.
    /// Returns the number of files removed.
    pub async fn clear(&self) -> Result<usize, StorageError> {
        let result = self.run_blocking(clear_dir).await;
        match &result {
            Ok(removed) => info!(removed, "Disk cache cleared"),
            Err(e) => warn!(error = %e, "Disk cache clear incomplete"),
        }
        result
    }

    // == Run Maintenance ==
    /// Two-phase sweep: delete expired records, then delete the oldest
    /// survivors until the total size is within the limit.
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        let size_limit = self.size_limit;
        let max_age = self.max_age;
        let result = self
            .run_blocking(move |dir| Ok(sweep(dir, Utc::now(), max_age, size_limit)))
            .await;

        match result {
            Ok(report) => {
                if report.removed() > 0 || report.failures > 0 {
                    info!(
                        expired = report.expired_removed,
                        oversize = report.oversize_removed,
                        failures = report.failures,
                        bytes_remaining = report.bytes_remaining,
                        "Disk maintenance removed records"
                    );
                } else {
                    debug!(
                        bytes_remaining = report.bytes_remaining,
                        "Disk maintenance: nothing to remove"
                    );
                }
                report
            }
            Err(e) => {
                warn!(error = %e, "Disk maintenance failed");
                MaintenanceReport::default()
            }
        }
    }

    // == Size On Disk ==
    /// Point-in-time sum of all record sizes. Scans the directory.
    pub async fn size_on_disk(&self) -> u64 {
        self.records()
            .await
            .iter()
            .map(|record| record.size)
            .sum()
    }

    // == Records ==
    /// Point-in-time listing of the store directory.
    pub async fn records(&self) -> Vec<DiskRecord> {
        match self.run_blocking(|dir| Ok(list_records(dir))).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Disk cache listing failed");
                Vec::new()
            }
        }
    }

    /// Runs a filesystem operation off the async runtime while holding the
    /// store's serialization lock.
    async fn run_blocking<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Path) -> Result<T, StorageError> + Send + 'static,
    {
        let _guard = self.io_lock.lock().await;
        let dir = Arc::clone(&self.dir);
        tokio::task::spawn_blocking(move || op(dir.as_path()))
            .await
            .map_err(|e| StorageError::Worker(e.to_string()))?
    }
}

// == Blocking Helpers ==

fn write_record(dir: &Path, hash: &str, bytes: &[u8]) -> Result<(), StorageError> {
    fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
    let path = dir.join(hash);
    fs::write(&path, bytes).map_err(|e| StorageError::io(path, e))
}

fn read_record(
    dir: &Path,
    hash: &str,
    now: DateTime<Utc>,
    max_age: Duration,
) -> Result<Option<Vec<u8>>, StorageError> {
    let path = dir.join(hash);
    let record = match fs::metadata(&path) {
        Ok(metadata) if metadata.is_file() => to_record(hash.to_string(), path.clone(), &metadata),
        Ok(_) => return Ok(None),
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(path, e)),
    };

    if record.is_expired(now, max_age) {
        debug!(hash, "Disk record expired, treating as miss");
        return Ok(None);
    }

    match fs::read(&path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

fn remove_file_if_present(path: &Path) -> Result<(), StorageError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::io(path, e)),
    }
}

fn clear_dir(dir: &Path) -> Result<usize, StorageError> {
    let records = list_records(dir);
    let attempted = records.len();
    let mut failed = 0;

    for record in &records {
        if let Err(e) = remove_file_if_present(&record.path) {
            warn!(error = %e, "Failed to delete disk record during clear");
            failed += 1;
        }
    }

    if failed > 0 {
        Err(StorageError::Incomplete { failed, attempted })
    } else {
        Ok(attempted)
    }
}

fn to_record(hash: String, path: PathBuf, metadata: &fs::Metadata) -> DiskRecord {
    let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    DiskRecord {
        hash,
        path,
        modified: DateTime::<Utc>::from(modified),
        size: metadata.len(),
    }
}

/// Lists regular files in the store directory. Unreadable entries are skipped.
fn list_records(dir: &Path) -> Vec<DiskRecord> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to list disk cache directory");
            return Vec::new();
        }
    };

    let mut records = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        match entry.metadata() {
            Ok(metadata) if metadata.is_file() => {
                let hash = entry.file_name().to_string_lossy().into_owned();
                records.push(to_record(hash, entry.path(), &metadata));
            }
            Ok(_) => {}
            Err(e) => {
                debug!(path = %entry.path().display(), error = %e, "Skipping entry without metadata");
            }
        }
    }
    records
}

/// Expiry phase followed by capacity phase, with a single `now` cutoff.
fn sweep(dir: &Path, now: DateTime<Utc>, max_age: Duration, size_limit: u64) -> MaintenanceReport {
    let mut report = MaintenanceReport::default();
    let mut survivors = Vec::new();

    // Phase 1: expiry
    for record in list_records(dir) {
        if record.is_expired(now, max_age) {
            match remove_file_if_present(&record.path) {
                Ok(()) => report.expired_removed += 1,
                Err(e) => {
                    warn!(hash = %record.hash, error = %e, "Failed to delete expired disk record");
                    report.failures += 1;
                }
            }
        } else {
            survivors.push(record);
        }
    }

    // Phase 2: capacity, oldest modification first
    let mut total: u64 = survivors.iter().map(|record| record.size).sum();
    if total > size_limit {
        survivors.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.hash.cmp(&b.hash)));

        for record in &survivors {
            if total <= size_limit {
                break;
            }
            match remove_file_if_present(&record.path) {
                Ok(()) => report.oversize_removed += 1,
                Err(e) => {
                    warn!(hash = %record.hash, error = %e, "Failed to delete disk record over size limit");
                    report.failures += 1;
                }
            }
            // Decremented even on failure; the next sweep retries the file
            total = total.saturating_sub(record.size);
        }
    }

    report.bytes_remaining = total;
    report
}
