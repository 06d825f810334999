//! # Data Report
//!
//! Optional JSON summary written alongside a data script.
//!
//! ```json
//! {
//!   "projects": { "column_count": 2, "columns": ["id", "name"], "row_count": 1 },
//!   "units":    { "column_count": 2, "columns": ["id", "project_id"], "row_count": 2 }
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::DataSnapshot;

/// Summary of one extracted table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSummary {
    pub column_count: usize,
    pub columns: Vec<String>,
    pub row_count: usize,
}

/// Per-table summaries keyed by table name, in extraction order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataReport {
    pub tables: IndexMap<String, TableSummary>,
}

impl DataReport {
    pub fn from_snapshot(tables: &DataSnapshot) -> Self {
        let tables = tables
            .iter()
            .map(|(name, table)| {
                (
                    name.clone(),
                    TableSummary {
                        column_count: table.columns.len(),
                        columns: table.columns.clone(),
                        row_count: table.row_count(),
                    },
                )
            })
            .collect();
        DataReport { tables }
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().map(|t| t.row_count).sum()
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> CoreResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| CoreError::Render {
            artifact: "data report".to_string(),
            reason: e.to_string(),
        })
    }
}
