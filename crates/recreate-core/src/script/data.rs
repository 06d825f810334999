//! Data script rendering.
//!
//! ## Script Layout
//! ```text
//! -- header (title, timestamp, source, totals)
//! PRAGMA foreign_keys = OFF;
//! BEGIN TRANSACTION;
//!
//! -- Table: projects (1 rows)
//! INSERT INTO projects (id, name) VALUES (1, 'Lac Ouest');
//!
//! -- Table: units (2 rows)
//! INSERT INTO units (id, project_id) VALUES (1, 1);
//! INSERT INTO units (id, project_id) VALUES (2, 1);
//!
//! COMMIT;
//! PRAGMA foreign_keys = ON;
//! ```

use indexmap::IndexMap;

use crate::script::literal::{quote_identifier, render_optional};
use crate::script::push_header;
use crate::types::{DataSnapshot, GeneratedScript, ScriptHeader, TableSnapshot};

/// A `-- Progress` comment is written after this many rows of one table.
/// Purely cosmetic; nothing reads it back.
pub const PROGRESS_INTERVAL: usize = 50;

/// Renders `tables` into a data script, visiting tables in `order`.
///
/// Tables in the snapshot but missing from `order` are appended in
/// snapshot order; names in `order` without a snapshot are skipped.
pub fn generate_data_script(
    tables: &DataSnapshot,
    order: &[String],
    header: &ScriptHeader,
) -> GeneratedScript {
    let visit: Vec<&TableSnapshot> = order
        .iter()
        .filter_map(|name| tables.get(name))
        .chain(
            tables
                .iter()
                .filter(|(name, _)| !order.iter().any(|o| o == *name))
                .map(|(_, table)| table),
        )
        .collect();

    let counts: IndexMap<String, usize> = visit
        .iter()
        .map(|t| (t.name.clone(), t.row_count()))
        .collect();
    let total_rows: usize = counts.values().sum();

    let mut out = String::new();
    push_header(&mut out, "Data recreation script", header);
    out.push_str(&format!(
        "-- Tables: {}, rows: {}\n\n",
        visit.len(),
        total_rows
    ));
    out.push_str("PRAGMA foreign_keys = OFF;\n");
    out.push_str("BEGIN TRANSACTION;\n");

    for table in visit {
        push_table(&mut out, table);
    }

    out.push_str("\nCOMMIT;\n");
    out.push_str("PRAGMA foreign_keys = ON;\n");

    GeneratedScript {
        text: out,
        source_path: header.source.clone(),
        generated_at: header.generated_at,
        object_or_row_counts: counts,
    }
}

fn push_table(out: &mut String, table: &TableSnapshot) {
    out.push('\n');
    if table.is_empty() {
        out.push_str(&format!("-- No data in table {}\n", table.name));
        return;
    }

    let total = table.row_count();
    out.push_str(&format!("-- Table: {} ({} rows)\n", table.name, total));

    let target = quote_identifier(&table.name);
    let columns = table
        .columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");

    for (i, row) in table.rows.iter().enumerate() {
        let values = table
            .columns
            .iter()
            .map(|c| render_optional(row.get(c)))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("INSERT INTO {target} ({columns}) VALUES ({values});\n"));

        let done = i + 1;
        if done % PROGRESS_INTERVAL == 0 {
            out.push_str(&format!("-- Progress: {done}/{total} rows\n"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::order;
    use crate::types::{Row, SqlValue};
    use chrono::{TimeZone, Utc};

    fn header() -> ScriptHeader {
        ScriptHeader::new("data/app.db", Utc.with_ymd_and_hms(2026, 10, 19, 8, 30, 0).unwrap())
    }

    fn scenario() -> DataSnapshot {
        let units = TableSnapshot::new("units", vec!["id".into(), "project_id".into()])
            .with_row([SqlValue::Integer(1), SqlValue::Integer(1)])
            .with_row([SqlValue::Integer(2), SqlValue::Integer(1)]);
        let projects = TableSnapshot::new("projects", vec!["id".into(), "name".into()])
            .with_row([SqlValue::Integer(1), "Lac Ouest".into()]);

        let mut tables = DataSnapshot::new();
        tables.insert("units".into(), units);
        tables.insert("projects".into(), projects);
        tables
    }

    #[test]
    fn test_projects_then_units_in_one_transaction() {
        let tables = scenario();
        let order = order(tables.keys(), &["projects", "units"]);
        let text = generate_data_script(&tables, &order, &header()).text;

        assert_eq!(text.matches("INSERT INTO projects").count(), 1);
        assert_eq!(text.matches("INSERT INTO units").count(), 2);
        assert_eq!(text.matches("BEGIN TRANSACTION;").count(), 1);
        assert_eq!(text.matches("COMMIT;").count(), 1);

        let begin = text.find("BEGIN TRANSACTION;").unwrap();
        let project = text.find("INSERT INTO projects").unwrap();
        let unit = text.find("INSERT INTO units").unwrap();
        let commit = text.find("COMMIT;").unwrap();
        assert!(begin < project && project < unit && unit < commit);

        assert!(text.contains(
            "INSERT INTO projects (id, name) VALUES (1, 'Lac Ouest');\n"
        ));
    }

    #[test]
    fn test_foreign_keys_disabled_then_restored() {
        let tables = scenario();
        let text = generate_data_script(&tables, &[], &header()).text;

        let off = text.find("PRAGMA foreign_keys = OFF;").unwrap();
        let begin = text.find("BEGIN TRANSACTION;").unwrap();
        let commit = text.find("COMMIT;").unwrap();
        let on = text.find("PRAGMA foreign_keys = ON;").unwrap();
        assert!(off < begin && commit < on);
    }

    #[test]
    fn test_empty_table_gets_comment() {
        let mut tables = DataSnapshot::new();
        tables.insert(
            "archive".into(),
            TableSnapshot::new("archive", vec!["id".into()]),
        );
        let script = generate_data_script(&tables, &[], &header());

        assert!(script.text.contains("-- No data in table archive\n"));
        assert!(!script.text.contains("INSERT INTO"));
        assert_eq!(script.object_or_row_counts["archive"], 0);
    }

    #[test]
    fn test_missing_column_renders_null() {
        let mut row = Row::new();
        row.insert("id".into(), SqlValue::Integer(7));
        let mut table = TableSnapshot::new("notes", vec!["id".into(), "body".into()]);
        table.rows.push(row);

        let mut tables = DataSnapshot::new();
        tables.insert("notes".into(), table);
        let text = generate_data_script(&tables, &[], &header()).text;

        assert!(text.contains("INSERT INTO notes (id, body) VALUES (7, NULL);"));
    }

    #[test]
    fn test_value_rendering_in_rows() {
        let table = TableSnapshot::new(
            "people",
            vec!["name".into(), "active".into(), "score".into(), "order".into()],
        )
        .with_row([
            "O'Brien".into(),
            SqlValue::Bool(true),
            SqlValue::Real(2.5),
            SqlValue::Null,
        ]);
        let mut tables = DataSnapshot::new();
        tables.insert("people".into(), table);
        let text = generate_data_script(&tables, &[], &header()).text;

        assert!(text.contains(
            "INSERT INTO people (name, active, score, \"order\") VALUES ('O''Brien', 1, 2.5, NULL);"
        ));
    }

    #[test]
    fn test_progress_comment_every_fifty_rows() {
        let mut table = TableSnapshot::new("ticks", vec!["n".into()]);
        for n in 0..120 {
            table.push_values([SqlValue::Integer(n)]);
        }
        let mut tables = DataSnapshot::new();
        tables.insert("ticks".into(), table);
        let text = generate_data_script(&tables, &[], &header()).text;

        assert_eq!(text.matches("-- Progress:").count(), 2);
        assert!(text.contains("-- Progress: 50/120 rows\n"));
        assert!(text.contains("-- Progress: 100/120 rows\n"));
    }

    #[test]
    fn test_counts_and_totals() {
        let tables = scenario();
        let order = order(tables.keys(), &["projects"]);
        let script = generate_data_script(&tables, &order, &header());

        assert!(script.text.contains("-- Tables: 2, rows: 3\n"));
        assert_eq!(
            script.object_or_row_counts.keys().collect::<Vec<_>>(),
            vec!["projects", "units"]
        );
    }

    #[test]
    fn test_output_is_deterministic() {
        let tables = scenario();
        let order = order(tables.keys(), &["projects"]);
        assert_eq!(
            generate_data_script(&tables, &order, &header()).text,
            generate_data_script(&tables, &order, &header()).text
        );
    }
}
