//! Durable idempotency store.
//!
//! One record file per seen fingerprint, named `<fingerprint>.json`. The
//! file's existence is the uniqueness constraint: inserts open it with
//! `create_new`, so a second insert for the same fingerprint fails at the
//! filesystem regardless of what the caller checked beforehand. The gate in
//! the relay pipeline serializes writers; this exclusive create is the
//! independent backstop beneath it.
//!
//! # Durability
//!
//! After writing a record the file and its directory are both fsynced, so a
//! successful insert survives restart. A crash mid-write can leave a record
//! file with truncated content; only the file's presence carries dedup
//! meaning, so such a record still counts as seen.

pub mod retention;

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::relay::fingerprint::Fingerprint;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A record for this fingerprint already exists. This is the uniqueness
    /// constraint firing; callers treat it as duplicate detection, not as a
    /// failure.
    #[error("fingerprint already recorded: {0}")]
    AlreadyRecorded(Fingerprint),

    /// IO error during file operations.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Record serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// A dedup record as serialized into its record file.
///
/// The fingerprint is the key; the timestamps are informational (the event
/// time for auditing, the insertion time for the retention sweep). Records
/// are immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRecord {
    /// The event fingerprint. Also the record's file stem.
    pub fingerprint: Fingerprint,

    /// Event timestamp in milliseconds since the epoch.
    pub timestamp: i64,

    /// When the record was inserted.
    pub recorded_at: DateTime<Utc>,
}

/// Durable set of seen fingerprints backed by a directory of record files.
#[derive(Debug, Clone)]
pub struct DedupStore {
    dir: PathBuf,
}

impl DedupStore {
    /// Opens a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<DedupStore> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(DedupStore { dir })
    }

    /// Returns the directory holding the record files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Checks whether a record exists for the given fingerprint.
    pub fn exists(&self, fingerprint: &Fingerprint) -> bool {
        self.record_path(fingerprint).exists()
    }

    /// Inserts a record for the given fingerprint.
    ///
    /// Fails with [`StoreError::AlreadyRecorded`] if a record for the
    /// fingerprint exists; an existing record is never overwritten. On
    /// success the record is durably on disk before this returns.
    pub fn insert(&self, fingerprint: &Fingerprint, timestamp: i64) -> Result<()> {
        let record = DedupRecord {
            fingerprint: fingerprint.clone(),
            timestamp,
            recorded_at: Utc::now(),
        };

        let path = self.record_path(fingerprint);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyRecorded(fingerprint.clone()));
            }
            Err(e) => return Err(e.into()),
        };

        file.write_all(&serde_json::to_vec_pretty(&record)?)?;
        fsync_file(&file)?;
        fsync_dir(&self.dir)?;

        Ok(())
    }

    /// Reads back a record, if present. Used by tests and the retention sweep.
    pub fn read(&self, fingerprint: &Fingerprint) -> Result<Option<DedupRecord>> {
        let path = self.record_path(fingerprint);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn record_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        // Fingerprints are URL-safe base64, so they contain no path
        // separators or dots.
        self.dir.join(format!("{}.json", fingerprint.as_str()))
    }
}

/// Syncs a file's contents and metadata to disk.
fn fsync_file(file: &File) -> io::Result<()> {
    file.sync_all()
}

/// Syncs a directory, making freshly created record files durable.
///
/// Creating a file updates its directory entry; without a directory fsync
/// that entry may not survive a power loss even though the file contents
/// were synced.
fn fsync_dir(dir: &Path) -> io::Result<()> {
    let handle = OpenOptions::new().read(true).open(dir)?;
    handle.sync_all()
}
