//! # Data Extraction
//!
//! Reads every row of every user table into a [`DataSnapshot`].
//!
//! ## Extraction Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       DataExtractor::dump                               │
//! │                                                                         │
//! │  user_tables()  ─► projects, units, schema_migrations, ...             │
//! │       │                                                                 │
//! │       ├── excluded? ─► TableExcluded event, skip                       │
//! │       ▼                                                                 │
//! │  pragma_table_info(t)  ─► column order + primary-key position          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SELECT "c1", "c2" FROM "t" [ORDER BY pk | rowid]                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  decode each cell by its runtime storage class                         │
//! │  NULL │ INTEGER │ REAL │ TEXT │ BLOB                                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any failure aborts the whole dump; a partial snapshot is never returned.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, TypeInfo, ValueRef};
use std::path::Path;
use tracing::{debug, info, warn};

use recreate_core::observer::{noop, EngineEvent, ObserverHandle};
use recreate_core::script::quote_identifier;
use recreate_core::{DataSnapshot, SqlValue, TableSnapshot, LEDGER_TABLE, SEQUENCE_TABLE};

use crate::connection::Database;
use crate::error::{describe, EngineError, EngineResult};
use crate::introspect::user_tables;

/// Tables never dumped, whatever the caller asks for.
pub const ALWAYS_EXCLUDED: [&str; 2] = [LEDGER_TABLE, SEQUENCE_TABLE];

#[derive(Debug, FromRow)]
struct ColumnInfo {
    name: String,
    pk: i64,
}

/// Dumps table contents from a source database.
#[derive(Clone)]
pub struct DataExtractor {
    observer: ObserverHandle,
    exclude: Vec<String>,
    stable_row_order: bool,
}

impl DataExtractor {
    /// An extractor with the default exclusion list.
    pub fn new(observer: ObserverHandle) -> Self {
        DataExtractor {
            observer,
            exclude: ALWAYS_EXCLUDED.iter().map(|t| t.to_string()).collect(),
            stable_row_order: false,
        }
    }

    /// Replaces the exclusion list. The ledger and `sqlite_sequence` stay
    /// excluded.
    pub fn with_excluded<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = ALWAYS_EXCLUDED.iter().map(|t| t.to_string()).collect();
        for table in tables {
            let table = table.into();
            if !table.is_empty() && !self.exclude.contains(&table) {
                self.exclude.push(table);
            }
        }
        self
    }

    /// Orders rows by primary key (or rowid) instead of scan order.
    pub fn stable_row_order(mut self, enabled: bool) -> Self {
        self.stable_row_order = enabled;
        self
    }

    pub fn excluded(&self) -> &[String] {
        &self.exclude
    }

    /// Reads every non-excluded table in catalog order.
    ///
    /// ## Errors
    /// - `Introspection` if the table list cannot be read
    /// - `Extraction { table }` for the first table that fails
    pub async fn dump(&self, db: &mut Database) -> EngineResult<DataSnapshot> {
        let tables = user_tables(db.conn()).await?;
        let mut snapshot = DataSnapshot::new();

        for table in tables {
            if self.exclude.contains(&table) {
                debug!(table = %table, "Table excluded");
                self.observer.notify(&EngineEvent::TableExcluded { table });
                continue;
            }

            let data = self.dump_table(db, &table).await?;
            debug!(table = %table, rows = data.row_count(), "Table extracted");
            self.observer.notify(&EngineEvent::TableExtracted {
                table: table.clone(),
                rows: data.row_count(),
            });
            snapshot.insert(table, data);
        }

        info!(
            path = %db.path().display(),
            tables = snapshot.len(),
            rows = snapshot.values().map(|t| t.row_count()).sum::<usize>(),
            "Data extracted"
        );
        Ok(snapshot)
    }

    /// Opens `path` read-only, dumps it and closes it.
    pub async fn dump_path(&self, path: &Path) -> EngineResult<DataSnapshot> {
        let mut db = Database::open_source(path).await?;
        let snapshot = self.dump(&mut db).await?;
        db.close().await?;
        Ok(snapshot)
    }

    async fn dump_table(&self, db: &mut Database, table: &str) -> EngineResult<TableSnapshot> {
        let columns: Vec<ColumnInfo> =
            sqlx::query_as("SELECT name, pk FROM pragma_table_info(?1) ORDER BY cid")
                .bind(table)
                .fetch_all(db.conn())
                .await
                .map_err(|e| EngineError::extraction(table, describe(&e)))?;
        if columns.is_empty() {
            return Err(EngineError::extraction(table, "table has no visible columns"));
        }

        let sql = self.select_statement(table, &columns);
        let rows = sqlx::query(&sql)
            .fetch_all(db.conn())
            .await
            .map_err(|e| EngineError::extraction(table, describe(&e)))?;

        let mut snapshot =
            TableSnapshot::new(table, columns.iter().map(|c| c.name.clone()).collect());
        for row in &rows {
            let values = (0..columns.len())
                .map(|index| decode_value(row, index, table))
                .collect::<EngineResult<Vec<_>>>()?;
            snapshot.push_values(values);
        }
        Ok(snapshot)
    }

    fn select_statement(&self, table: &str, columns: &[ColumnInfo]) -> String {
        let column_list = columns
            .iter()
            .map(|c| quote_identifier(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let mut sql = format!("SELECT {} FROM {}", column_list, quote_identifier(table));

        if self.stable_row_order {
            let mut keys: Vec<&ColumnInfo> = columns.iter().filter(|c| c.pk > 0).collect();
            keys.sort_by_key(|c| c.pk);
            if keys.is_empty() {
                sql.push_str(" ORDER BY rowid");
            } else {
                let order = keys
                    .iter()
                    .map(|c| quote_identifier(&c.name))
                    .collect::<Vec<_>>()
                    .join(", ");
                sql.push_str(&format!(" ORDER BY {order}"));
            }
        }
        sql
    }
}

impl Default for DataExtractor {
    fn default() -> Self {
        DataExtractor::new(noop())
    }
}

/// Decodes one cell by the storage class of the stored value, not the
/// column's declared type.
fn decode_value(row: &SqliteRow, index: usize, table: &str) -> EngineResult<SqlValue> {
    let raw = row
        .try_get_raw(index)
        .map_err(|e| EngineError::extraction(table, describe(&e)))?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let storage_class = raw.type_info().name().to_string();

    let value = match storage_class.as_str() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(index).map(SqlValue::Integer),
        "REAL" => row.try_get_unchecked::<f64, _>(index).map(SqlValue::Real),
        "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(index).map(SqlValue::Blob),
        _ => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(|bytes| decode_text(bytes, table, index)),
    };
    value.map_err(|e| EngineError::extraction(table, describe(&e)))
}

/// Text that is not valid UTF-8 keeps its exact bytes.
fn decode_text(bytes: Vec<u8>, table: &str, index: usize) -> SqlValue {
    match String::from_utf8(bytes) {
        Ok(text) => SqlValue::Text(text),
        Err(e) => {
            warn!(table = %table, column = index, "Invalid UTF-8 in text value, keeping raw bytes");
            SqlValue::TextBytes(e.into_bytes())
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
