//! # recreate-db: Database Layer for the Recreation Engine
//!
//! Everything that touches a SQLite file: reading a source catalog and its
//! rows, writing generated scripts, backing up a target and applying
//! scripts to it under the migration ledger.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Recreation Data Flow                             │
//! │                                                                         │
//! │  recreate-schemas / recreate-inserts                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  recreate-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐   │   │
//! │  │   │  introspect  │   │   output     │   │    executor      │   │   │
//! │  │   │  extract     │──►│  (scripts)   │──►│  (ledger + tx)   │   │   │
//! │  │   └──────┬───────┘   └──────────────┘   └────────┬─────────┘   │   │
//! │  │          │                                        │             │   │
//! │  │   connection.rs (one SqliteConnection per database)            │   │
//! │  └──────────┼────────────────────────────────────────┼─────────────┘   │
//! │             ▼                                        ▼                 │
//! │  ┌────────────────────┐                  ┌────────────────────────┐   │
//! │  │  source (read-only)│                  │  target (WAL, backups) │   │
//! │  └────────────────────┘                  └────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`connection`] - Opening and tuning source/target databases
//! - [`introspect`] - Catalog capture
//! - [`extract`] - Row extraction
//! - [`executor`] - Ledger and transactional script application
//! - [`backup`] - Timestamped target copies
//! - [`output`] - Writing scripts and reports
//! - [`pipeline`] - The two end-to-end operations
//! - [`error`] - Engine error taxonomy
//!
//! ## Usage
//!
//! ```rust,ignore
//! use recreate_db::{load_config, Engine, RunOptions, TracingObserver};
//!
//! let config = load_config("config/database.json".as_ref())?;
//! let mut options = RunOptions::from_config(&config);
//! options.execute = true;
//!
//! let outcome = Engine::new(TracingObserver::handle())
//!     .recreate_schemas(&options, chrono::Utc::now())
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backup;
pub mod config;
pub mod connection;
pub mod error;
pub mod executor;
pub mod extract;
pub mod introspect;
pub mod observer;
pub mod output;
pub mod pipeline;

// =============================================================================
// Re-exports
// =============================================================================

pub use backup::BackupManager;
pub use config::{load_config, DEFAULT_CONFIG_PATH};
pub use connection::{ConnectionConfig, Database};
pub use error::{EngineError, EngineResult};
pub use executor::{list_scripts, MigrationExecutor, MigrationFile, MigrationSummary};
pub use extract::DataExtractor;
pub use introspect::SchemaIntrospector;
pub use observer::TracingObserver;
pub use output::ScriptWriter;
pub use pipeline::{Engine, RunOptions, RunOutcome};
