//! SQL literal and identifier rendering.
//!
//! Values are assumed to come from a trusted dump. Doubling embedded single
//! quotes is the only text escaping applied.

use std::fmt::Write;

use crate::types::SqlValue;

/// Every keyword SQLite reserves or treats specially. Identifiers that
/// collide with one of these are always quoted.
const SQLITE_KEYWORDS: &[&str] = &[
    "ABORT", "ACTION", "ADD", "AFTER", "ALL", "ALTER", "ALWAYS", "ANALYZE", "AND", "AS", "ASC",
    "ATTACH", "AUTOINCREMENT", "BEFORE", "BEGIN", "BETWEEN", "BY", "CASCADE", "CASE", "CAST",
    "CHECK", "COLLATE", "COLUMN", "COMMIT", "CONFLICT", "CONSTRAINT", "CREATE", "CROSS",
    "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP", "DATABASE", "DEFAULT",
    "DEFERRABLE", "DEFERRED", "DELETE", "DESC", "DETACH", "DISTINCT", "DO", "DROP", "EACH",
    "ELSE", "END", "ESCAPE", "EXCEPT", "EXCLUDE", "EXCLUSIVE", "EXISTS", "EXPLAIN", "FAIL",
    "FILTER", "FIRST", "FOLLOWING", "FOR", "FOREIGN", "FROM", "FULL", "GENERATED", "GLOB",
    "GROUP", "GROUPS", "HAVING", "IF", "IGNORE", "IMMEDIATE", "IN", "INDEX", "INDEXED",
    "INITIALLY", "INNER", "INSERT", "INSTEAD", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN",
    "KEY", "LAST", "LEFT", "LIKE", "LIMIT", "MATCH", "MATERIALIZED", "NATURAL", "NO", "NOT",
    "NOTHING", "NOTNULL", "NULL", "NULLS", "OF", "OFFSET", "ON", "OR", "ORDER", "OTHERS",
    "OUTER", "OVER", "PARTITION", "PLAN", "PRAGMA", "PRECEDING", "PRIMARY", "QUERY", "RAISE",
    "RANGE", "RECURSIVE", "REFERENCES", "REGEXP", "REINDEX", "RELEASE", "RENAME", "REPLACE",
    "RESTRICT", "RETURNING", "RIGHT", "ROLLBACK", "ROW", "ROWS", "SAVEPOINT", "SELECT", "SET",
    "TABLE", "TEMP", "TEMPORARY", "THEN", "TIES", "TO", "TRANSACTION", "TRIGGER", "UNBOUNDED",
    "UNION", "UNIQUE", "UPDATE", "USING", "VACUUM", "VALUES", "VIEW", "VIRTUAL", "WHEN", "WHERE",
    "WINDOW", "WITH", "WITHOUT",
];

/// Renders one value as an SQL literal.
///
/// ## Rules
/// - `Null` → `NULL`
/// - integers → unquoted
/// - reals → unquoted, always with a decimal point or exponent so SQLite
///   reads them back as REAL; NaN → `NULL`, ±∞ → `±9e999`
/// - booleans → `1` / `0`
/// - text → single-quoted, embedded `'` doubled
/// - text that is not valid UTF-8 → `CAST(X'..' AS TEXT)`
/// - blobs → `X'..'` hex literal
pub fn render_value(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(v) => v.to_string(),
        SqlValue::Real(v) => render_real(*v),
        SqlValue::Bool(v) => (if *v { "1" } else { "0" }).to_string(),
        SqlValue::Text(v) => quote_text(v),
        SqlValue::TextBytes(bytes) => format!("CAST({} AS TEXT)", hex_literal(bytes)),
        SqlValue::Blob(bytes) => hex_literal(bytes),
    }
}

fn hex_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2 + 3);
    out.push_str("X'");
    for b in bytes {
        // Writing to a String cannot fail.
        let _ = write!(out, "{b:02X}");
    }
    out.push('\'');
    out
}

/// Renders an optional value; a missing value is `NULL`.
pub fn render_optional(value: Option<&SqlValue>) -> String {
    value.map(render_value).unwrap_or_else(|| "NULL".to_string())
}

fn render_real(v: f64) -> String {
    if v.is_nan() {
        return "NULL".to_string();
    }
    if v.is_infinite() {
        return (if v > 0.0 { "9e999" } else { "-9e999" }).to_string();
    }
    // Debug keeps a trailing ".0" on integral values and switches to
    // exponent notation for very large or small magnitudes.
    format!("{v:?}")
}

/// Single-quotes `text`, doubling embedded single quotes.
pub fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Renders an identifier, quoting it only when it is not a plain name.
///
/// Plain means `[A-Za-z_][A-Za-z0-9_]*` and not an SQLite keyword. Quoted
/// identifiers use double quotes with embedded `"` doubled.
pub fn quote_identifier(name: &str) -> String {
    if is_plain_identifier(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return false;
    }
    let upper = name.to_ascii_uppercase();
    SQLITE_KEYWORDS.binary_search(&upper.as_str()).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_sorted_for_binary_search() {
        let mut sorted = SQLITE_KEYWORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, SQLITE_KEYWORDS);
    }

    #[test]
    fn test_render_scalars() {
        assert_eq!(render_value(&SqlValue::Null), "NULL");
        assert_eq!(render_value(&SqlValue::Integer(-42)), "-42");
        assert_eq!(render_value(&SqlValue::Bool(true)), "1");
        assert_eq!(render_value(&SqlValue::Bool(false)), "0");
        assert_eq!(render_optional(None), "NULL");
    }

    #[test]
    fn test_render_reals_stay_real() {
        assert_eq!(render_value(&SqlValue::Real(1.0)), "1.0");
        assert_eq!(render_value(&SqlValue::Real(12.5)), "12.5");
        assert_eq!(render_value(&SqlValue::Real(1e300)), "1e300");
        assert_eq!(render_value(&SqlValue::Real(f64::NAN)), "NULL");
        assert_eq!(render_value(&SqlValue::Real(f64::NEG_INFINITY)), "-9e999");
    }

    #[test]
    fn test_text_quotes_are_doubled() {
        assert_eq!(render_value(&SqlValue::Text("O'Brien".into())), "'O''Brien'");
        assert_eq!(render_value(&SqlValue::Text("''".into())), "''''''");
        assert_eq!(render_value(&SqlValue::Text(String::new())), "''");
    }

    #[test]
    fn test_text_keeps_newlines_and_semicolons() {
        assert_eq!(
            render_value(&SqlValue::Text("a;\nb".into())),
            "'a;\nb'"
        );
    }

    #[test]
    fn test_blob_hex() {
        assert_eq!(render_value(&SqlValue::Blob(vec![0x00, 0xAB, 0x7f])), "X'00AB7F'");
        assert_eq!(render_value(&SqlValue::Blob(Vec::new())), "X''");
    }

    #[test]
    fn test_invalid_utf8_text_is_cast_from_hex() {
        assert_eq!(
            render_value(&SqlValue::TextBytes(vec![0x61, 0xFF, 0x27])),
            "CAST(X'61FF27' AS TEXT)"
        );
    }

    #[test]
    fn test_identifiers() {
        assert_eq!(quote_identifier("projects"), "projects");
        assert_eq!(quote_identifier("project_id"), "project_id");
        assert_eq!(quote_identifier("order"), "\"order\"");
        assert_eq!(quote_identifier("unit name"), "\"unit name\"");
        assert_eq!(quote_identifier("2fa"), "\"2fa\"");
        assert_eq!(quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(quote_identifier(""), "\"\"");
    }
}
