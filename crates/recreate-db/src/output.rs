//! # Script Output
//!
//! Writes generated scripts and reports into the migrations directory.
//!
//! ## File Names
//! ```text
//! migrations/
//! ├── 001_recreate_schemas_20240101_120000.sql
//! ├── 002_recreate_inserts_20240101_120000.sql
//! └── data_report_20240101_120000.json
//! ```
//!
//! The numeric prefix keeps a schema script ahead of a data script
//! generated in the same second, since the executor applies files in
//! filename order. Existing files are never overwritten.

use chrono::{DateTime, Utc};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

use recreate_core::observer::{EngineEvent, ObserverHandle};
use recreate_core::{DataReport, GeneratedScript};

use crate::error::{EngineError, EngineResult};

/// Timestamp format used in generated filenames.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

pub fn schema_file_name(at: DateTime<Utc>) -> String {
    format!("001_recreate_schemas_{}.sql", at.format(FILE_TIMESTAMP_FORMAT))
}

pub fn data_file_name(at: DateTime<Utc>) -> String {
    format!("002_recreate_inserts_{}.sql", at.format(FILE_TIMESTAMP_FORMAT))
}

pub fn report_file_name(at: DateTime<Utc>) -> String {
    format!("data_report_{}.json", at.format(FILE_TIMESTAMP_FORMAT))
}

/// Writes artifacts into one output directory.
#[derive(Clone)]
pub struct ScriptWriter {
    dir: PathBuf,
    observer: ObserverHandle,
}

impl ScriptWriter {
    pub fn new(dir: impl Into<PathBuf>, observer: ObserverHandle) -> Self {
        ScriptWriter {
            dir: dir.into(),
            observer,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write_schema(&self, script: &GeneratedScript) -> EngineResult<PathBuf> {
        self.write_new(&schema_file_name(script.generated_at), &script.text)
    }

    pub fn write_data(&self, script: &GeneratedScript) -> EngineResult<PathBuf> {
        self.write_new(&data_file_name(script.generated_at), &script.text)
    }

    pub fn write_report(&self, report: &DataReport, at: DateTime<Utc>) -> EngineResult<PathBuf> {
        let json = report.to_json()?;
        self.write_new(&report_file_name(at), &json)
    }

    /// Creates the directory if needed and writes `name`, failing if it
    /// already exists.
    fn write_new(&self, name: &str, contents: &str) -> EngineResult<PathBuf> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            EngineError::Generation(format!(
                "cannot create output directory {}: {e}",
                self.dir.display()
            ))
        })?;

        let path = self.dir.join(name);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| EngineError::Generation(format!("cannot create {}: {e}", path.display())))?;
        file.write_all(contents.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| EngineError::Generation(format!("cannot write {}: {e}", path.display())))?;

        info!(path = %path.display(), bytes = contents.len(), "Artifact written");
        self.observer.notify(&EngineEvent::ArtifactWritten {
            path: path.clone(),
            bytes: contents.len(),
        });
        Ok(path)
    }
}
