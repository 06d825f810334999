//! # Engine Error Types
//!
//! The closed error taxonomy every operation returns.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error / io::Error / CoreError                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  EngineError (this module) ← adds table / file / path context          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CLI prints message + cause chain, exits with code 1                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation Rules
//! - Introspection/extraction errors abort the run before any file is written.
//! - A migration error rolls back that file only and halts the batch.

use std::path::Path;
use thiserror::Error;

use recreate_core::CoreError;

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing config file, missing mandatory key, unsupported type, or an
    /// invalid setting.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Source or target database could not be opened.
    ///
    /// ## When This Occurs
    /// - Source file does not exist
    /// - File permissions issue
    /// - Database locked by another writer past the busy timeout
    #[error("Connection to {path} failed: {message}")]
    Connection { path: String, message: String },

    /// A catalog query failed.
    #[error("Catalog introspection failed: {0}")]
    Introspection(String),

    /// Reading the rows of one table failed. The whole dump is abandoned.
    #[error("Extraction failed for table '{table}': {message}")]
    Extraction { table: String, message: String },

    /// A script or report could not be rendered or written.
    #[error("Script generation failed: {0}")]
    Generation(String),

    /// Executing a migration file (or recording it in the ledger) failed.
    /// The file's transaction was rolled back.
    #[error("Migration '{version}' failed and was rolled back: {message}")]
    MigrationApplication { version: String, message: String },

    /// Copying the target database file failed.
    #[error("Backup of {path} failed: {message}")]
    Backup { path: String, message: String },
}

impl EngineError {
    pub fn connection(path: &Path, message: impl Into<String>) -> Self {
        EngineError::Connection {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    pub fn extraction(table: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Extraction {
            table: table.into(),
            message: message.into(),
        }
    }

    pub fn migration(version: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::MigrationApplication {
            version: version.into(),
            message: message.into(),
        }
    }

    pub fn backup(path: &Path, message: impl Into<String>) -> Self {
        EngineError::Backup {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    /// Whether retrying the same run could succeed without changing inputs.
    ///
    /// Only connection failures qualify (locked file, transient I/O). A
    /// malformed script or missing key fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::Connection { .. })
    }

    /// Formats the error with its cause chain for terminal output.
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\n  Caused by ({depth}): {err}"));
            source = err.source();
            depth += 1;
        }

        output
    }
}

impl From<CoreError> for EngineError {
    fn from(err: CoreError) -> Self {
        match err {
            e if e.is_configuration() => EngineError::Configuration(e.to_string()),
            CoreError::UnknownObjectKind(kind) => {
                EngineError::Introspection(format!("unknown catalog object kind '{kind}'"))
            }
            e => EngineError::Generation(e.to_string()),
        }
    }
}

/// Renders a sqlx error as the database reported it.
///
/// Database errors keep SQLite's own message (e.g.
/// `UNIQUE constraint failed: schema_migrations.version`) so failures reach
/// the operator verbatim.
pub fn describe(err: &sqlx::Error) -> String {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().to_string(),
        sqlx::Error::PoolTimedOut => "timed out waiting for a connection".to_string(),
        other => other.to_string(),
    }
}

/// True when `err` is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.message().contains("UNIQUE constraint failed"),
        _ => false,
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
