//! # Target Backups
//!
//! Byte-level copy of a target database before migrations touch it.
//!
//! ```text
//! data/prod.db  ──copy──►  data/prod.db.20240101_120000
//! data/prod.db-wal ─────►  data/prod.db.20240101_120000-wal   (if present)
//! ```
//!
//! Run this while no connection to the target is open. A backup never
//! overwrites an existing file.

use chrono::{DateTime, Utc};
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

use recreate_core::observer::{noop, EngineEvent, ObserverHandle};

use crate::error::{EngineError, EngineResult};

/// Suffix format appended to the target filename.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Takes timestamped copies of a target database file.
#[derive(Clone)]
pub struct BackupManager {
    observer: ObserverHandle,
}

impl BackupManager {
    pub fn new(observer: ObserverHandle) -> Self {
        BackupManager { observer }
    }

    /// Copies `target` to `<target>.<now>`.
    ///
    /// Returns `None` when there is nothing to back up.
    pub fn snapshot(&self, target: &Path) -> EngineResult<Option<PathBuf>> {
        self.snapshot_at(target, Utc::now())
    }

    /// [`snapshot`](Self::snapshot) with an explicit timestamp.
    ///
    /// ## Errors
    /// - `Backup` if the copy fails or the backup file already exists
    pub fn snapshot_at(&self, target: &Path, now: DateTime<Utc>) -> EngineResult<Option<PathBuf>> {
        if !target.exists() {
            info!(target = %target.display(), "No existing target, skipping backup");
            self.observer.notify(&EngineEvent::Backup { path: None });
            return Ok(None);
        }

        let backup = backup_path(target, now);
        let bytes = copy_new(target, &backup)?;

        let wal = with_suffix(target, "-wal");
        if wal.exists() {
            copy_new(&wal, &with_suffix(&backup, "-wal"))?;
        }

        info!(
            target = %target.display(),
            backup = %backup.display(),
            bytes,
            "Target backed up"
        );
        self.observer.notify(&EngineEvent::Backup {
            path: Some(backup.clone()),
        });
        Ok(Some(backup))
    }
}

impl Default for BackupManager {
    fn default() -> Self {
        BackupManager::new(noop())
    }
}

/// `<target>.<YYYYmmdd_HHMMSS>`
pub fn backup_path(target: &Path, now: DateTime<Utc>) -> PathBuf {
    with_suffix(target, &format!(".{}", now.format(BACKUP_TIMESTAMP_FORMAT)))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn copy_new(from: &Path, to: &Path) -> EngineResult<u64> {
    let mut source = File::open(from).map_err(|e| EngineError::backup(from, e.to_string()))?;
    let mut dest = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)
        .map_err(|e| EngineError::backup(to, e.to_string()))?;
    let bytes = io::copy(&mut source, &mut dest).map_err(|e| EngineError::backup(to, e.to_string()))?;
    dest.sync_all()
        .map_err(|e| EngineError::backup(to, e.to_string()))?;
    Ok(bytes)
}
