//! Schema script rendering.
//!
//! ## Script Layout
//! ```text
//! -- header (title, timestamp, source, counts)
//! PRAGMA foreign_keys = ON;
//! -- Tables     ← in dependency order
//! -- Indexes    ┐
//! -- Views      ├ catalog order; may reference any table above
//! -- Triggers   ┘
//! ```
//!
//! The block order is fixed: indexes, views and triggers can only be
//! created once the objects they reference exist.

use indexmap::IndexMap;

use crate::script::{push_header, terminate};
use crate::types::{CatalogSnapshot, GeneratedScript, ObjectKind, ScriptHeader};

/// Renders `catalog` into a schema script.
///
/// `order` is the table creation order. Tables in the catalog but missing
/// from `order` are appended in catalog order so nothing is dropped; names
/// in `order` that are not catalog tables are skipped.
pub fn generate_schema_script(
    catalog: &CatalogSnapshot,
    order: &[String],
    header: &ScriptHeader,
) -> GeneratedScript {
    let mut counts = IndexMap::new();
    counts.insert("tables".to_string(), catalog.tables.len());
    counts.insert("indexes".to_string(), catalog.indexes.len());
    counts.insert("views".to_string(), catalog.views.len());
    counts.insert("triggers".to_string(), catalog.triggers.len());

    let mut out = String::new();
    push_header(&mut out, "Schema recreation script", header);
    out.push_str(&format!(
        "-- Objects: {} tables, {} indexes, {} views, {} triggers\n\n",
        catalog.tables.len(),
        catalog.indexes.len(),
        catalog.views.len(),
        catalog.triggers.len()
    ));
    out.push_str("PRAGMA foreign_keys = ON;\n");

    push_block(&mut out, "Tables", ordered_tables(catalog, order));
    for kind in [ObjectKind::Index, ObjectKind::View, ObjectKind::Trigger] {
        let title = match kind {
            ObjectKind::Index => "Indexes",
            ObjectKind::View => "Views",
            _ => "Triggers",
        };
        push_block(
            &mut out,
            title,
            catalog
                .group(kind)
                .iter()
                .map(|(name, sql)| (name.as_str(), sql.as_str()))
                .collect(),
        );
    }

    GeneratedScript {
        text: out,
        source_path: header.source.clone(),
        generated_at: header.generated_at,
        object_or_row_counts: counts,
    }
}

fn ordered_tables<'a>(catalog: &'a CatalogSnapshot, order: &'a [String]) -> Vec<(&'a str, &'a str)> {
    let mut tables: Vec<(&str, &str)> = order
        .iter()
        .filter_map(|name| {
            catalog
                .tables
                .get_key_value(name)
                .map(|(k, v)| (k.as_str(), v.as_str()))
        })
        .collect();

    for (name, sql) in &catalog.tables {
        if !order.iter().any(|o| o == name) {
            tables.push((name.as_str(), sql.as_str()));
        }
    }
    tables
}

fn push_block(out: &mut String, title: &str, entries: Vec<(&str, &str)>) {
    out.push_str(&format!("\n-- {title}\n"));
    if entries.is_empty() {
        out.push_str(&format!("-- (no {})\n", title.to_lowercase()));
        return;
    }
    for (_, definition) in entries {
        out.push_str(&terminate(definition));
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::order;
    use crate::types::CatalogEntry;
    use chrono::{TimeZone, Utc};

    fn header() -> ScriptHeader {
        ScriptHeader::new("data/app.db", Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap())
    }

    fn entry(kind: ObjectKind, name: &str, definition: &str) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            kind,
            definition: definition.to_string(),
        }
    }

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot::from_entries(vec![
            entry(
                ObjectKind::Table,
                "units",
                "CREATE TABLE units (id INTEGER PRIMARY KEY, project_id INTEGER REFERENCES projects(id))",
            ),
            entry(ObjectKind::Index, "idx_units_project", "CREATE INDEX idx_units_project ON units (project_id)"),
            entry(ObjectKind::Table, "projects", "CREATE TABLE projects (id INTEGER PRIMARY KEY, name TEXT)"),
            entry(
                ObjectKind::Trigger,
                "trg_units",
                "CREATE TRIGGER trg_units AFTER INSERT ON units BEGIN SELECT 1; END",
            ),
            entry(ObjectKind::View, "v_units", "CREATE VIEW v_units AS SELECT * FROM units"),
        ])
    }

    #[test]
    fn test_projects_created_before_units() {
        let catalog = catalog();
        let order = order(catalog.tables.keys(), &["projects"]);
        let script = generate_schema_script(&catalog, &order, &header());

        let projects = script.text.find("CREATE TABLE projects").unwrap();
        let units = script.text.find("CREATE TABLE units").unwrap();
        assert!(projects < units);
    }

    #[test]
    fn test_block_order_is_fixed() {
        let catalog = catalog();
        let order = order(catalog.tables.keys(), &["projects"]);
        let text = generate_schema_script(&catalog, &order, &header()).text;

        let fk = text.find("PRAGMA foreign_keys = ON;").unwrap();
        let last_table = text.find("CREATE TABLE units").unwrap();
        let index = text.find("CREATE INDEX").unwrap();
        let view = text.find("CREATE VIEW").unwrap();
        let trigger = text.find("CREATE TRIGGER").unwrap();
        assert!(fk < last_table);
        assert!(last_table < index);
        assert!(index < view);
        assert!(view < trigger);
    }

    #[test]
    fn test_header_and_counts() {
        let script = generate_schema_script(&catalog(), &[], &header());

        assert!(script.text.starts_with("-- Schema recreation script\n"));
        assert!(script.text.contains("-- Generated: 2026-10-19T08:30:00Z\n"));
        assert!(script.text.contains("-- Source: data/app.db\n"));
        assert_eq!(script.object_or_row_counts["tables"], 2);
        assert_eq!(script.object_or_row_counts["triggers"], 1);
        assert_eq!(script.source_path, "data/app.db");
    }

    #[test]
    fn test_tables_missing_from_order_are_appended() {
        let catalog = catalog();
        let text = generate_schema_script(&catalog, &["ghost".to_string()], &header()).text;

        assert!(text.contains("CREATE TABLE units"));
        assert!(text.contains("CREATE TABLE projects"));
        assert!(!text.contains("ghost"));
    }

    #[test]
    fn test_definitions_are_terminated_once() {
        let mut catalog = CatalogSnapshot::default();
        catalog.insert(entry(ObjectKind::Table, "a", "CREATE TABLE a (x)"));
        catalog.insert(entry(ObjectKind::Table, "b", "CREATE TABLE b (x);"));
        let text = generate_schema_script(&catalog, &[], &header()).text;

        assert!(text.contains("CREATE TABLE a (x);\n"));
        assert!(text.contains("CREATE TABLE b (x);\n"));
        assert!(!text.contains(";;"));
    }

    #[test]
    fn test_empty_blocks_are_marked() {
        let text = generate_schema_script(&CatalogSnapshot::default(), &[], &header()).text;
        assert!(text.contains("-- (no tables)"));
        assert!(text.contains("-- (no triggers)"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let catalog = catalog();
        let order = order(catalog.tables.keys(), &["projects"]);
        let first = generate_schema_script(&catalog, &order, &header());
        let second = generate_schema_script(&catalog, &order, &header());
        assert_eq!(first, second);
    }
}
