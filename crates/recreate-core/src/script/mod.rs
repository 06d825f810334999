//! # Script Generation
//!
//! Renders snapshots into SQL scripts.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CatalogSnapshot ──► order ──► generate_schema_script ──► 001_*.sql    │
//! │                                                                         │
//! │  DataSnapshot ─────► order ──► generate_data_script ────► 002_*.sql    │
//! │                                                                         │
//! │  any *.sql ────────► prepare_script ──► executor transaction           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both generators are pure: identical snapshot, order and header give
//! byte-identical text.

pub mod data;
pub mod literal;
pub mod prepare;
pub mod schema;

pub use data::{generate_data_script, PROGRESS_INTERVAL};
pub use literal::{quote_identifier, quote_text, render_value};
pub use prepare::{prepare_script, PreparedScript};
pub use schema::generate_schema_script;

use chrono::SecondsFormat;

use crate::types::ScriptHeader;

/// Writes the common comment header.
pub(crate) fn push_header(out: &mut String, title: &str, header: &ScriptHeader) {
    out.push_str(&format!("-- {title}\n"));
    out.push_str(&format!(
        "-- Generated: {}\n",
        header
            .generated_at
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    out.push_str(&format!("-- Source: {}\n", header.source));
}

/// Terminates a catalog definition with exactly one semicolon.
pub(crate) fn terminate(definition: &str) -> String {
    let trimmed = definition.trim_end();
    if trimmed.ends_with(';') {
        trimmed.to_string()
    } else {
        format!("{trimmed};")
    }
}
