//! # recreate-core: Pure Logic for the Recreation Engine
//!
//! Everything the engine decides without touching a database or a file:
//! snapshot types, dependency ordering, script rendering, script
//! preparation for execution, the data report, config validation and the
//! observer contract.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Recreation Engine                                 │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            recreate-cli (recreate-schemas / recreate-inserts)   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                recreate-db (SQLite via sqlx)                    │   │
//! │  │   introspect · extract · executor · backup · output             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ recreate-core (THIS CRATE) ★                    │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐  ┌─────────┐  ┌─────────┐  ┌─────────┐           │   │
//! │  │   │  types  │  │  order  │  │ script  │  │ config  │           │   │
//! │  │   └─────────┘  └─────────┘  └─────────┘  └─────────┘           │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK • PURE FUNCTIONS              │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use chrono::Utc;
//! use recreate_core::order::order;
//! use recreate_core::script::generate_data_script;
//! use recreate_core::{DataSnapshot, ScriptHeader, SqlValue, TableSnapshot};
//!
//! let mut tables = DataSnapshot::new();
//! tables.insert(
//!     "projects".into(),
//!     TableSnapshot::new("projects", vec!["id".into(), "name".into()])
//!         .with_row([SqlValue::Integer(1), "Lac Ouest".into()]),
//! );
//!
//! let order = order(tables.keys(), &["projects"]);
//! let script = generate_data_script(&tables, &order, &ScriptHeader::new("app.db", Utc::now()));
//! assert!(script.text.contains("INSERT INTO projects (id, name) VALUES (1, 'Lac Ouest');"));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod observer;
pub mod order;
pub mod report;
pub mod script;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use config::{EngineConfig, LEDGER_TABLE, SEQUENCE_TABLE};
pub use error::{CoreError, CoreResult};
pub use observer::{EngineEvent, Observer, ObserverHandle};
pub use order::DependencyOrderer;
pub use report::DataReport;
pub use types::*;
