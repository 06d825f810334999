//! # Schema Introspection
//!
//! Reads every user-defined object from a source catalog.
//!
//! ## What Gets Captured
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      sqlite_master (rowid order)                        │
//! │                                                                         │
//! │  type     name                    sql                                   │
//! │  ───────  ──────────────────────  ─────────────────────────────         │
//! │  table    projects                CREATE TABLE projects (...)   ✓      │
//! │  table    sqlite_sequence         CREATE TABLE sqlite_sequence  ✗ reserved
//! │  index    sqlite_autoindex_...    NULL                          ✗ no sql
//! │  table    schema_migrations       CREATE TABLE schema_migr...   ✗ ledger
//! │  table    docs_data               CREATE TABLE 'docs_data'...   ✗ shadow
//! │  index    idx_units_project       CREATE INDEX ...              ✓      │
//! │  view     v_occupancy             CREATE VIEW ...               ✓      │
//! │  trigger  trg_units_audit         CREATE TRIGGER ...            ✓      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Shadow tables belong to a virtual table (FTS5, R*Tree) and are recreated
//! by its `CREATE VIRTUAL TABLE`, so emitting them would collide.

use sqlx::sqlite::SqliteConnection;
use sqlx::FromRow;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use recreate_core::observer::{noop, EngineEvent, ObserverHandle};
use recreate_core::{CatalogEntry, CatalogSnapshot, ObjectKind, LEDGER_TABLE};

use crate::connection::Database;
use crate::error::{describe, EngineError, EngineResult};

const CATALOG_QUERY: &str = r"
    SELECT type AS kind, name, tbl_name, sql
    FROM sqlite_master
    WHERE sql IS NOT NULL
      AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
    ORDER BY rowid
";

const TABLES_QUERY: &str = r"
    SELECT name
    FROM sqlite_master
    WHERE type = 'table'
      AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
    ORDER BY rowid
";

#[derive(Debug, FromRow)]
struct MasterRow {
    kind: String,
    name: String,
    tbl_name: String,
    sql: String,
}

/// Captures the catalog of a source database.
#[derive(Clone)]
pub struct SchemaIntrospector {
    observer: ObserverHandle,
}

impl SchemaIntrospector {
    pub fn new(observer: ObserverHandle) -> Self {
        SchemaIntrospector { observer }
    }

    /// Reads tables, indexes, views and triggers in catalog order.
    ///
    /// ## Errors
    /// - `Introspection` if the catalog query fails or an entry has an
    ///   unknown kind
    pub async fn capture(&self, db: &mut Database) -> EngineResult<CatalogSnapshot> {
        let rows: Vec<MasterRow> = sqlx::query_as(CATALOG_QUERY)
            .fetch_all(db.conn())
            .await
            .map_err(|e| EngineError::Introspection(describe(&e)))?;
        let shadows = shadow_tables(db.conn()).await;

        let mut snapshot = CatalogSnapshot::default();
        for row in rows {
            if row.name == LEDGER_TABLE || row.tbl_name == LEDGER_TABLE {
                debug!(name = %row.name, "Skipping ledger object");
                continue;
            }
            if shadows.contains(&row.name) {
                debug!(name = %row.name, "Skipping shadow table");
                continue;
            }

            let kind = ObjectKind::from_str(&row.kind)?;
            snapshot.insert(CatalogEntry {
                name: row.name,
                kind,
                definition: row.sql,
            });
        }

        info!(
            path = %db.path().display(),
            tables = snapshot.tables.len(),
            indexes = snapshot.indexes.len(),
            views = snapshot.views.len(),
            triggers = snapshot.triggers.len(),
            "Catalog captured"
        );
        self.observer.notify(&EngineEvent::CatalogCaptured {
            tables: snapshot.tables.len(),
            indexes: snapshot.indexes.len(),
            views: snapshot.views.len(),
            triggers: snapshot.triggers.len(),
        });

        Ok(snapshot)
    }

    /// Opens `path` read-only, captures it and closes it.
    pub async fn capture_path(&self, path: &Path) -> EngineResult<CatalogSnapshot> {
        let mut db = Database::open_source(path).await?;
        let snapshot = self.capture(&mut db).await?;
        db.close().await?;
        Ok(snapshot)
    }
}

impl Default for SchemaIntrospector {
    fn default() -> Self {
        SchemaIntrospector::new(noop())
    }
}

/// User tables in catalog order, without reserved and shadow tables.
pub(crate) async fn user_tables(conn: &mut SqliteConnection) -> EngineResult<Vec<String>> {
    let names: Vec<String> = sqlx::query_scalar(TABLES_QUERY)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| EngineError::Introspection(describe(&e)))?;
    let shadows = shadow_tables(conn).await;

    Ok(names
        .into_iter()
        .filter(|name| !shadows.contains(name))
        .collect())
}

/// Names of virtual-table shadow tables.
///
/// `pragma_table_list` needs SQLite 3.37; on older libraries nothing is
/// treated as a shadow table.
async fn shadow_tables(conn: &mut SqliteConnection) -> HashSet<String> {
    let result: Result<Vec<String>, sqlx::Error> = sqlx::query_scalar(
        "SELECT name FROM pragma_table_list WHERE schema = 'main' AND type = 'shadow'",
    )
    .fetch_all(conn)
    .await;

    match result {
        Ok(names) => names.into_iter().collect(),
        Err(e) => {
            debug!(error = %describe(&e), "pragma_table_list unavailable");
            HashSet::new()
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
