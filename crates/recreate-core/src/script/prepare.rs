//! Preparing a script for execution inside an executor-owned transaction.
//!
//! Generated data scripts carry their own `BEGIN TRANSACTION;` / `COMMIT;`
//! and toggle `PRAGMA foreign_keys`. SQLite rejects a nested `BEGIN`, and
//! ignores `foreign_keys` while a transaction is open, so before execution
//! the executor strips transaction control and hoists the pragma out.
//!
//! The script is split into statements with quotes, comments and trigger
//! bodies taken into account, so `COMMIT;` after another statement on the
//! same line is found, and `BEGIN ... END;` inside `CREATE TRIGGER` is not
//! mistaken for transaction control.
//!
//! ```text
//! BEGIN | COMMIT | END [TRANSACTION]   removed
//! PRAGMA foreign_keys = <v>            removed, reported in `foreign_keys`
//! ROLLBACK [TRANSACTION]               reported in `unsupported`
//! anything else                        kept verbatim
//! ```

/// A script with transaction control removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedScript {
    /// Script text to run inside the executor's transaction.
    pub body: String,
    /// `Some(false)` when the script disables foreign-key enforcement
    /// anywhere, `Some(true)` when it only enables it, `None` when it never
    /// mentions it.
    pub foreign_keys: Option<bool>,
    /// Number of statements that were removed.
    pub removed_statements: usize,
    /// Statements that would end the executor's transaction and cannot be
    /// absorbed. A script with any of these must not run.
    pub unsupported: Vec<String>,
}

/// Strips transaction control and `foreign_keys` pragmas.
pub fn prepare_script(text: &str) -> PreparedScript {
    let (statements, trailing) = split_statements(text);

    let mut body = String::with_capacity(text.len());
    let mut foreign_keys = None;
    let mut removed_statements = 0;
    let mut unsupported = Vec::new();
    // Set after removing a statement that started its line, so the line
    // break it leaves behind goes too.
    let mut drop_line_break = false;

    for statement in &statements {
        let leading = if drop_line_break {
            strip_line_break(statement.leading)
        } else {
            statement.leading
        };

        let words: Vec<&str> = statement.tokens.iter().map(String::as_str).collect();
        let removed = match classify(&words) {
            Kind::TransactionControl => true,
            Kind::ForeignKeys(enabled) => {
                foreign_keys = match (foreign_keys, enabled) {
                    (Some(false), _) | (_, false) => Some(false),
                    _ => Some(true),
                };
                true
            }
            Kind::Rollback => {
                unsupported.push(statement.text.trim().to_string());
                false
            }
            Kind::Other => false,
        };

        if removed {
            removed_statements += 1;
            body.push_str(leading.trim_end_matches([' ', '\t']));
            drop_line_break = body.is_empty() || body.ends_with('\n');
        } else {
            body.push_str(leading);
            body.push_str(statement.text);
            drop_line_break = false;
        }
    }

    if drop_line_break {
        body.push_str(strip_line_break(trailing));
    } else {
        body.push_str(trailing);
    }

    PreparedScript {
        body,
        foreign_keys,
        removed_statements,
        unsupported,
    }
}

/// Drops leading spaces and tabs plus one line break.
fn strip_line_break(text: &str) -> &str {
    let rest = text.trim_start_matches([' ', '\t']);
    rest.strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest)
}

// =============================================================================
// Classification
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    TransactionControl,
    ForeignKeys(bool),
    Rollback,
    Other,
}

fn classify(words: &[&str]) -> Kind {
    match words {
        ["BEGIN", rest @ ..] => {
            let rest = match rest {
                ["DEFERRED" | "IMMEDIATE" | "EXCLUSIVE", tail @ ..] => tail,
                _ => rest,
            };
            if transaction_tail(rest) {
                Kind::TransactionControl
            } else {
                Kind::Other
            }
        }
        ["COMMIT" | "END", rest @ ..] if transaction_tail(rest) => Kind::TransactionControl,
        // ROLLBACK TO only unwinds a savepoint.
        ["ROLLBACK", rest @ ..] if !rest.contains(&"TO") => Kind::Rollback,
        ["PRAGMA", "FOREIGN_KEYS", "=", value] => match *value {
            "ON" | "1" | "TRUE" | "YES" => Kind::ForeignKeys(true),
            "OFF" | "0" | "FALSE" | "NO" => Kind::ForeignKeys(false),
            _ => Kind::Other,
        },
        _ => Kind::Other,
    }
}

fn transaction_tail(rest: &[&str]) -> bool {
    matches!(rest, [] | ["TRANSACTION"] | ["TRANSACTION", _])
}

// =============================================================================
// Statement Splitting
// =============================================================================

/// One statement and the whitespace and comments before it.
#[derive(Debug)]
struct Statement<'a> {
    leading: &'a str,
    /// From the first token through the terminating `;`, if there is one.
    text: &'a str,
    /// Words uppercased, other tokens verbatim, `;` and comments left out.
    tokens: Vec<String>,
}

/// Splits `text` into statements. Returns them with whatever follows the
/// last one.
fn split_statements(text: &str) -> (Vec<Statement<'_>>, &str) {
    let bytes = text.as_bytes();
    let mut statements = Vec::new();
    let mut segment_start = 0;
    let mut statement_start = None;
    let mut statement_end = 0;
    let mut tokens: Vec<String> = Vec::new();

    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match b {
            b' ' | b'\t' | b'\n' | b'\r' | 0x0c => {
                i += 1;
                continue;
            }
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = find_from(bytes, i + 2, b"\n").map_or(bytes.len(), |p| p + 1);
                continue;
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = find_from(bytes, i + 2, b"*/").map_or(bytes.len(), |p| p + 2);
                continue;
            }
            _ => {}
        }

        let start = i;
        i = match b {
            b'\'' | b'"' | b'`' => end_of_quoted(bytes, i, b),
            b'[' => find_from(bytes, i + 1, b"]").map_or(bytes.len(), |p| p + 1),
            _ if is_word_byte(b) => {
                let mut j = i;
                while j < bytes.len() && is_word_byte(bytes[j]) {
                    j += 1;
                }
                j
            }
            _ => i + 1,
        };
        let first = *statement_start.get_or_insert(start);
        statement_end = i;

        if b == b';' && ends_statement(&tokens) {
            statements.push(Statement {
                leading: &text[segment_start..first],
                text: &text[first..i],
                tokens: std::mem::take(&mut tokens),
            });
            segment_start = i;
            statement_start = None;
        } else if b != b';' {
            let token = &text[start..i];
            tokens.push(if is_word_byte(b) {
                token.to_ascii_uppercase()
            } else {
                token.to_string()
            });
        }
    }

    match statement_start {
        Some(first) => {
            statements.push(Statement {
                leading: &text[segment_start..first],
                text: &text[first..statement_end],
                tokens,
            });
            (statements, &text[statement_end..])
        }
        None => (statements, &text[segment_start..]),
    }
}

/// Whether a `;` after `tokens` ends the statement. Inside a trigger it
/// only does so once the body's closing `END` has been seen.
fn ends_statement(tokens: &[String]) -> bool {
    let words: Vec<&str> = tokens.iter().map(String::as_str).collect();
    let is_trigger = matches!(
        words.as_slice(),
        ["CREATE", "TRIGGER", ..] | ["CREATE", "TEMP" | "TEMPORARY", "TRIGGER", ..]
    );
    if !is_trigger {
        return true;
    }

    let mut in_body = false;
    let mut open_cases = 0usize;
    let mut closed = false;
    for word in words {
        closed = false;
        match word {
            "BEGIN" if !in_body => in_body = true,
            "CASE" if in_body => open_cases += 1,
            "END" if in_body && open_cases > 0 => open_cases -= 1,
            "END" if in_body => closed = true,
            _ => {}
        }
    }
    closed
}

/// Index just past the closing quote; doubled quotes are part of the
/// token. An unterminated quote runs to the end of the text.
fn end_of_quoted(bytes: &[u8], open: usize, quote: u8) -> usize {
    let mut j = open + 1;
    while let Some(p) = find_from(bytes, j, &[quote]) {
        if bytes.get(p + 1) == Some(&quote) {
            j = p + 2;
        } else {
            return p + 1;
        }
    }
    bytes.len()
}

fn find_from(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    bytes
        .get(from..)?
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Identifier and number characters. Bytes of multi-byte UTF-8 sequences
/// count as word characters, as SQLite treats them.
fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}
