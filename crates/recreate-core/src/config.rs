//! # Engine Configuration
//!
//! The JSON document describing database paths and tuning.
//!
//! ## Document Format
//! ```json
//! {
//!   "database": {
//!     "type": "sqlite",
//!     "path": "data/app.db",
//!     "migrations_path": "migrations",
//!     "target_path": "data/prod.db"
//!   },
//!   "performance": {
//!     "journal_mode": "WAL",
//!     "cache_size": -64000,
//!     "synchronous": "NORMAL",
//!     "foreign_keys": true
//!   },
//!   "ordering": { "priority": ["users", "projects", "units"] },
//!   "extraction": { "stable_row_order": false }
//! }
//! ```
//!
//! Only `database.type`, `database.path` and `database.migrations_path` are
//! mandatory, and `type` must be `sqlite`. Everything else is trusted and
//! defaulted. Reading the file is the caller's job; this module only parses
//! text.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{CoreError, CoreResult};
use crate::order::DEFAULT_PRIORITY;

/// Name of the ledger table in every target database.
pub const LEDGER_TABLE: &str = "schema_migrations";

/// SQLite's AUTOINCREMENT bookkeeping table.
pub const SEQUENCE_TABLE: &str = "sqlite_sequence";

/// Validated engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
    pub performance: PerformanceConfig,
    pub ordering: OrderingConfig,
    pub extraction: ExtractionConfig,
}

/// Database location settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseConfig {
    /// Always `"sqlite"` after validation.
    #[serde(rename = "type")]
    pub kind: String,
    /// Source database file.
    pub path: PathBuf,
    /// Directory holding generated and hand-written scripts.
    pub migrations_path: PathBuf,
    /// Database that `--execute` applies scripts to.
    pub target_path: Option<PathBuf>,
}

/// Connection tuning applied to the target before migrations run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub journal_mode: String,
    /// Negative values are KiB, positive values are pages.
    pub cache_size: i64,
    pub synchronous: String,
    pub foreign_keys: bool,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig {
            journal_mode: "WAL".to_string(),
            cache_size: -64000,
            synchronous: "NORMAL".to_string(),
            foreign_keys: true,
        }
    }
}

/// Human-maintained table priority list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderingConfig {
    pub priority: Vec<String>,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        OrderingConfig {
            priority: DEFAULT_PRIORITY.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Row extraction settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Order rows by primary key for reproducible, diffable output.
    pub stable_row_order: bool,
}

// Mirror of the document before mandatory keys are checked.
#[derive(Debug, Deserialize)]
struct RawConfig {
    database: Option<RawDatabase>,
    #[serde(default)]
    performance: PerformanceConfig,
    #[serde(default)]
    ordering: OrderingConfig,
    #[serde(default)]
    extraction: ExtractionConfig,
}

#[derive(Debug, Deserialize)]
struct RawDatabase {
    #[serde(rename = "type")]
    kind: Option<String>,
    path: Option<String>,
    migrations_path: Option<String>,
    target_path: Option<String>,
}

impl EngineConfig {
    /// Parses and validates a config document.
    ///
    /// ## Errors
    /// - `InvalidDocument` if the text is not JSON of the right shape
    /// - `MissingKey` for an absent or empty mandatory key
    /// - `UnsupportedDatabase` if `database.type` is not `sqlite`
    pub fn from_json(text: &str) -> CoreResult<Self> {
        let raw: RawConfig = serde_json::from_str(text)?;
        let db = raw
            .database
            .ok_or_else(|| CoreError::MissingKey("database".to_string()))?;

        let kind = required(db.kind, "database.type")?;
        if !kind.eq_ignore_ascii_case("sqlite") {
            return Err(CoreError::UnsupportedDatabase(kind));
        }
        let path = required(db.path, "database.path")?;
        let migrations_path = required(db.migrations_path, "database.migrations_path")?;

        Ok(EngineConfig {
            database: DatabaseConfig {
                kind: "sqlite".to_string(),
                path: PathBuf::from(path),
                migrations_path: PathBuf::from(migrations_path),
                target_path: db.target_path.filter(|p| !p.trim().is_empty()).map(PathBuf::from),
            },
            performance: raw.performance,
            ordering: raw.ordering,
            extraction: raw.extraction,
        })
    }

    /// Builds a config from explicit paths with every optional section at
    /// its default.
    pub fn for_paths(path: impl Into<PathBuf>, migrations_path: impl Into<PathBuf>) -> Self {
        EngineConfig {
            database: DatabaseConfig {
                kind: "sqlite".to_string(),
                path: path.into(),
                migrations_path: migrations_path.into(),
                target_path: None,
            },
            performance: PerformanceConfig::default(),
            ordering: OrderingConfig::default(),
            extraction: ExtractionConfig::default(),
        }
    }
}

fn required(value: Option<String>, key: &str) -> CoreResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(CoreError::MissingKey(key.to_string())),
    }
}
