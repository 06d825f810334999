//! # Snapshot Types
//!
//! Point-in-time copies of a source database and the artifacts produced
//! from them.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Engine Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │ CatalogSnapshot │   │  TableSnapshot  │   │ MigrationRecord │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  tables         │   │  name           │   │  version        │       │
//! │  │  indexes        │   │  columns        │   │  applied_at     │       │
//! │  │  views          │   │  rows           │   └─────────────────┘       │
//! │  │  triggers       │   └─────────────────┘                              │
//! │  └─────────────────┘            │                                       │
//! │           │                     ▼                                       │
//! │           │            ┌─────────────────┐                              │
//! │           └──────────► │ GeneratedScript │  (written once to disk)      │
//! │                        └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Snapshots are produced fresh on every run and never mutated after
//! capture.

use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

// =============================================================================
// Catalog
// =============================================================================

/// The kind of a catalog object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Table,
    Index,
    View,
    Trigger,
}

impl ObjectKind {
    /// Returns the catalog spelling (`sqlite_master.type`).
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Table => "table",
            ObjectKind::Index => "index",
            ObjectKind::View => "view",
            ObjectKind::Trigger => "trigger",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "table" => Ok(ObjectKind::Table),
            "index" => Ok(ObjectKind::Index),
            "view" => Ok(ObjectKind::View),
            "trigger" => Ok(ObjectKind::Trigger),
            other => Err(CoreError::UnknownObjectKind(other.to_string())),
        }
    }
}

/// The defining statement text for one database object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub kind: ObjectKind,
    pub definition: String,
}

/// Every user-defined object of a database, grouped by kind.
///
/// Each group maps name → definition in catalog order. Catalog order is
/// creation order in SQLite, which is also the fallback order used when
/// an object is not on the priority list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogSnapshot {
    pub tables: IndexMap<String, String>,
    pub indexes: IndexMap<String, String>,
    pub views: IndexMap<String, String>,
    pub triggers: IndexMap<String, String>,
}

impl CatalogSnapshot {
    /// Builds a snapshot from catalog entries, keeping their order.
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut snapshot = CatalogSnapshot::default();
        for entry in entries {
            snapshot.insert(entry);
        }
        snapshot
    }

    /// Adds one entry to the group matching its kind.
    pub fn insert(&mut self, entry: CatalogEntry) {
        let group = match entry.kind {
            ObjectKind::Table => &mut self.tables,
            ObjectKind::Index => &mut self.indexes,
            ObjectKind::View => &mut self.views,
            ObjectKind::Trigger => &mut self.triggers,
        };
        group.insert(entry.name, entry.definition);
    }

    /// Returns the group for `kind`.
    pub fn group(&self, kind: ObjectKind) -> &IndexMap<String, String> {
        match kind {
            ObjectKind::Table => &self.tables,
            ObjectKind::Index => &self.indexes,
            ObjectKind::View => &self.views,
            ObjectKind::Trigger => &self.triggers,
        }
    }

    /// Total number of objects across all groups.
    pub fn object_count(&self) -> usize {
        self.tables.len() + self.indexes.len() + self.views.len() + self.triggers.len()
    }

    /// Every object name, tables first, then indexes, views, triggers.
    pub fn names(&self) -> Vec<String> {
        [ObjectKind::Table, ObjectKind::Index, ObjectKind::View, ObjectKind::Trigger]
            .iter()
            .flat_map(|kind| self.group(*kind).keys().cloned())
            .collect()
    }
}

// =============================================================================
// Row Data
// =============================================================================

/// One cell value read from the source.
///
/// SQLite stores values by storage class rather than declared type, so the
/// variants follow the storage classes plus `Bool` for callers that build
/// snapshots by hand.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Bool(bool),
    Text(String),
    /// A TEXT value whose bytes are not valid UTF-8, kept verbatim.
    TextBytes(Vec<u8>),
    Blob(Vec<u8>),
}

impl SqlValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// One row, keyed by column name in column order.
pub type Row = IndexMap<String, SqlValue>;

/// A point-in-time copy of one table's rows.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSnapshot {
    pub name: String,
    /// Column names in catalog order. Unique and order-significant.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl TableSnapshot {
    /// Creates an empty snapshot with the given columns.
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        TableSnapshot {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Appends a row given positionally in column order.
    ///
    /// Values beyond the column count are ignored; missing trailing values
    /// are simply absent from the row and render as `NULL`.
    pub fn push_values(&mut self, values: impl IntoIterator<Item = SqlValue>) {
        let row: Row = self.columns.iter().cloned().zip(values).collect();
        self.rows.push(row);
    }

    /// Builder-style variant of [`push_values`](Self::push_values).
    pub fn with_row(mut self, values: impl IntoIterator<Item = SqlValue>) -> Self {
        self.push_values(values);
        self
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Table name → rows, in extraction order.
pub type DataSnapshot = IndexMap<String, TableSnapshot>;

// =============================================================================
// Ledger
// =============================================================================

/// One successfully applied script, as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationRecord {
    /// Script filename. Unique within the ledger.
    pub version: String,
    pub applied_at: NaiveDateTime,
}

/// Per-file progress through the executor.
///
/// ```text
/// Pending ──► Applying ──┬──► Applied     (terminal, recorded in ledger)
///                        └──► RolledBack  (terminal for this run only)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    Pending,
    Applying,
    Applied,
    RolledBack,
}

impl MigrationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MigrationState::Applied | MigrationState::RolledBack)
    }
}

// =============================================================================
// Generated Artifacts
// =============================================================================

/// Metadata stamped at the top of every generated script.
///
/// The timestamp is supplied by the caller so rendering stays a pure
/// function of its inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptHeader {
    /// Where the snapshot came from, usually the source database path.
    pub source: String,
    pub generated_at: DateTime<Utc>,
}

impl ScriptHeader {
    pub fn new(source: impl Into<String>, generated_at: DateTime<Utc>) -> Self {
        ScriptHeader {
            source: source.into(),
            generated_at,
        }
    }
}

/// A rendered script, ready to be written once to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedScript {
    pub text: String,
    pub source_path: String,
    pub generated_at: DateTime<Utc>,
    /// Object counts per kind for schema scripts, row counts per table for
    /// data scripts.
    pub object_or_row_counts: IndexMap<String, usize>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_kind_parse() {
        assert_eq!("view".parse::<ObjectKind>().unwrap(), ObjectKind::View);
        assert!(matches!(
            "shadow".parse::<ObjectKind>(),
            Err(CoreError::UnknownObjectKind(kind)) if kind == "shadow"
        ));
    }

    #[test]
    fn test_catalog_groups_keep_order() {
        let snapshot = CatalogSnapshot::from_entries(vec![
            CatalogEntry {
                name: "units".into(),
                kind: ObjectKind::Table,
                definition: "CREATE TABLE units (id INTEGER)".into(),
            },
            CatalogEntry {
                name: "idx_units".into(),
                kind: ObjectKind::Index,
                definition: "CREATE INDEX idx_units ON units (id)".into(),
            },
            CatalogEntry {
                name: "projects".into(),
                kind: ObjectKind::Table,
                definition: "CREATE TABLE projects (id INTEGER)".into(),
            },
        ]);

        assert_eq!(
            snapshot.tables.keys().collect::<Vec<_>>(),
            vec!["units", "projects"]
        );
        assert_eq!(snapshot.object_count(), 3);
        assert_eq!(snapshot.names(), vec!["units", "projects", "idx_units"]);
    }

    #[test]
    fn test_push_values_keys_rows_by_column() {
        let table = TableSnapshot::new("projects", vec!["id".into(), "name".into()])
            .with_row([SqlValue::Integer(1), "Lac Ouest".into()]);

        assert_eq!(table.row_count(), 1);
        assert_eq!(table.rows[0]["name"], SqlValue::Text("Lac Ouest".into()));
    }

    #[test]
    fn test_option_into_value() {
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(3_i64)), SqlValue::Integer(3));
    }

    #[test]
    fn test_terminal_states() {
        assert!(MigrationState::Applied.is_terminal());
        assert!(MigrationState::RolledBack.is_terminal());
        assert!(!MigrationState::Applying.is_terminal());
    }
}
