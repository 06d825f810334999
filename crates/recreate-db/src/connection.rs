//! # Database Connections
//!
//! Opening source and target SQLite databases.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Connection Lifecycle                               │
//! │                                                                         │
//! │  ConnectionConfig::source(path)      ConnectionConfig::target(path, p) │
//! │       │  read-only, never created         │  created if missing         │
//! │       ▼                                   ▼                             │
//! │  Database::open(config).await ← one SqliteConnection, owned by the     │
//! │       │                          operation that opened it               │
//! │       ▼                                                                 │
//! │  introspect / extract / execute                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  db.close().await  (success)   or   drop(db)  (error path)             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Target Tuning
//! The target is tuned once at open from the `performance` config:
//! - WAL journal mode (readers don't block the writer)
//! - NORMAL synchronous (balance of durability and speed)
//! - 64 MiB page cache
//! - Foreign keys enabled (SQLite disables them by default)
//!
//! None of this affects correctness.

use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqliteSynchronous};
use sqlx::{ConnectOptions, Connection};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use recreate_core::config::PerformanceConfig;

use crate::error::{describe, EngineError, EngineResult};

// =============================================================================
// Configuration
// =============================================================================

/// How to open one database file.
///
/// ## Example
/// ```rust,ignore
/// let config = ConnectionConfig::target("./prod.db", PerformanceConfig::default())
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Path to the SQLite database file.
    pub database_path: PathBuf,

    /// Open without write access. Sources are always read-only.
    pub read_only: bool,

    /// Create the file if it doesn't exist. Targets only.
    pub create_if_missing: bool,

    /// How long SQLite waits on a locked database before failing.
    /// Default: 5 seconds
    pub busy_timeout: Duration,

    /// Tuning applied at open. `None` leaves SQLite defaults.
    pub performance: Option<PerformanceConfig>,
}

impl ConnectionConfig {
    /// A read-only source. The file must already exist.
    pub fn source(path: impl Into<PathBuf>) -> Self {
        ConnectionConfig {
            database_path: path.into(),
            read_only: true,
            create_if_missing: false,
            busy_timeout: Duration::from_secs(5),
            performance: None,
        }
    }

    /// A writable target, created if missing and tuned with `performance`.
    pub fn target(path: impl Into<PathBuf>, performance: PerformanceConfig) -> Self {
        ConnectionConfig {
            database_path: path.into(),
            read_only: false,
            create_if_missing: true,
            busy_timeout: Duration::from_secs(5),
            performance: Some(performance),
        }
    }

    /// Sets the busy timeout.
    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    fn connect_options(&self) -> EngineResult<SqliteConnectOptions> {
        let mut options = SqliteConnectOptions::new()
            .filename(&self.database_path)
            .read_only(self.read_only)
            .create_if_missing(self.create_if_missing)
            .busy_timeout(self.busy_timeout)
            .foreign_keys(false)
            // Script bodies can be megabytes; keep them out of the logs.
            .disable_statement_logging();

        if let Some(perf) = &self.performance {
            let journal_mode = SqliteJournalMode::from_str(&perf.journal_mode).map_err(|_| {
                EngineError::Configuration(format!(
                    "unknown performance.journal_mode '{}'",
                    perf.journal_mode
                ))
            })?;
            let synchronous = SqliteSynchronous::from_str(&perf.synchronous).map_err(|_| {
                EngineError::Configuration(format!(
                    "unknown performance.synchronous '{}'",
                    perf.synchronous
                ))
            })?;

            options = options
                .journal_mode(journal_mode)
                .synchronous(synchronous)
                .foreign_keys(perf.foreign_keys);
        }

        Ok(options)
    }
}

// =============================================================================
// Database
// =============================================================================

/// One open SQLite connection, exclusively owned.
///
/// Dropping a `Database` closes the connection, so every early return
/// releases it. Call [`close`](Self::close) on the success path to surface
/// close errors.
#[derive(Debug)]
pub struct Database {
    conn: SqliteConnection,
    path: PathBuf,
}

impl Database {
    /// Opens the database described by `config`.
    ///
    /// ## Errors
    /// - `Connection` if a read-only source does not exist or the file
    ///   cannot be opened
    /// - `Configuration` for an unknown journal mode or synchronous setting
    pub async fn open(config: &ConnectionConfig) -> EngineResult<Self> {
        info!(
            path = %config.database_path.display(),
            read_only = config.read_only,
            "Opening database"
        );

        if !config.create_if_missing && !config.database_path.exists() {
            return Err(EngineError::connection(
                &config.database_path,
                "database file does not exist",
            ));
        }

        let options = config.connect_options()?;
        let mut conn = options
            .connect()
            .await
            .map_err(|e| EngineError::connection(&config.database_path, describe(&e)))?;

        // cache_size is per connection, so it is set here rather than
        // through the connect options.
        if let Some(perf) = &config.performance {
            sqlx::query(&format!("PRAGMA cache_size = {}", perf.cache_size))
                .execute(&mut conn)
                .await
                .map_err(|e| EngineError::connection(&config.database_path, describe(&e)))?;
        }

        debug!(path = %config.database_path.display(), "Connection established");

        Ok(Database {
            conn,
            path: config.database_path.clone(),
        })
    }

    /// Opens a read-only source.
    pub async fn open_source(path: impl Into<PathBuf>) -> EngineResult<Self> {
        Database::open(&ConnectionConfig::source(path)).await
    }

    /// Opens (creating if needed) and tunes a target.
    pub async fn open_target(
        path: impl Into<PathBuf>,
        performance: PerformanceConfig,
    ) -> EngineResult<Self> {
        Database::open(&ConnectionConfig::target(path, performance)).await
    }

    /// The underlying connection.
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Checks that the database answers queries.
    pub async fn health_check(&mut self) -> bool {
        sqlx::query("SELECT 1").execute(&mut self.conn).await.is_ok()
    }

    /// Closes the connection.
    pub async fn close(self) -> EngineResult<()> {
        debug!(path = %self.path.display(), "Closing database");
        let path = self.path;
        self.conn
            .close()
            .await
            .map_err(|e| EngineError::connection(&path, describe(&e)))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
