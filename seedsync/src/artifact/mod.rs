//! Reading generated SQL files back into records.
//!
//! Only understands the statements written by [`crate::sql`]:
//! `INSERT INTO t (cols) VALUES (vals);`. Statements end at a `;` outside
//! quoted literals and values are split on commas outside them, with `''`
//! inside a literal as an escaped quote. Text containing quotes, commas,
//! semicolons or newlines survives the round trip.

use serde::Serialize;
use serde_json::{Number, Value};
use std::path::Path;

use crate::error::{ArtifactError, ArtifactResult};
use crate::models::Record;

/// One parsed `INSERT` line.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertRow {
    pub table: String,
    pub record: Record,
}

/// Records of one table, in file order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableRows {
    pub table: String,
    pub records: Vec<Record>,
}

/// Every table found in a SQL file, in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct ParsedArtifact {
    pub tables: Vec<TableRows>,
}

impl ParsedArtifact {
    pub fn records(&self, table: &str) -> Option<&[Record]> {
        self.tables
            .iter()
            .find(|t| t.table == table)
            .map(|t| t.records.as_slice())
    }

    pub fn row_count(&self) -> usize {
        self.tables.iter().map(|t| t.records.len()).sum()
    }
}

/// One statement of a SQL file and the line it starts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub line: usize,
    pub text: String,
}

/// Statements found in `text`, plus the start line of a trailing
/// statement whose quoted literal never closes.
fn scan_statements(text: &str) -> (Vec<Statement>, Option<usize>) {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut start = 1;
    let mut line = 1;
    let mut in_string = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' if in_string => {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    current.push('\'');
                } else {
                    in_string = false;
                }
                current.push(ch);
            }
            '\'' => {
                in_string = true;
                current.push(ch);
            }
            // Comment lines between statements
            '-' if !in_string && current.trim().is_empty() && chars.peek() == Some(&'-') => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        line += 1;
                        break;
                    }
                }
                current.clear();
            }
            ';' if !in_string => {
                current.push(ch);
                statements.push(Statement {
                    line: start,
                    text: current.trim().to_string(),
                });
                current.clear();
            }
            _ => {
                if current.trim().is_empty() && !ch.is_whitespace() {
                    start = line;
                }
                if ch == '\n' {
                    line += 1;
                }
                current.push(ch);
            }
        }
    }

    if in_string {
        return (statements, Some(start));
    }
    if !current.trim().is_empty() {
        statements.push(Statement {
            line: start,
            text: current.trim().to_string(),
        });
    }
    (statements, None)
}

/// The first `n` `INSERT` statements of `text`.
pub fn first_inserts(text: &str, n: usize) -> Vec<String> {
    scan_statements(text)
        .0
        .into_iter()
        .filter(|stmt| stmt.text.starts_with("INSERT"))
        .take(n)
        .map(|stmt| stmt.text)
        .collect()
}

/// Split SQL text into statements on `;` outside quoted literals.
///
/// Comment lines between statements are dropped.
pub fn split_statements(text: &str) -> ArtifactResult<Vec<Statement>> {
    match scan_statements(text) {
        (_, Some(line)) => Err(ArtifactError::UnterminatedString { line }),
        (statements, None) => Ok(statements),
    }
}

/// Number of `INSERT` statements in `text`.
pub fn count_inserts(text: &str) -> usize {
    scan_statements(text)
        .0
        .iter()
        .filter(|stmt| stmt.text.starts_with("INSERT"))
        .count()
}

/// Split a value list on top-level commas.
///
/// `line` is used for error messages only.
pub fn split_values(list: &str, line: usize) -> ArtifactResult<Vec<String>> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut chars = list.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' if in_string => {
                if chars.peek() == Some(&'\'') {
                    chars.next();
                    current.push_str("''");
                } else {
                    in_string = false;
                    current.push(ch);
                }
            }
            '\'' => {
                in_string = true;
                current.push(ch);
            }
            ',' if !in_string => {
                values.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if in_string {
        return Err(ArtifactError::UnterminatedString { line });
    }
    if !current.trim().is_empty() || !values.is_empty() {
        values.push(current.trim().to_string());
    }

    Ok(values)
}

/// Convert one SQL literal back into JSON.
pub fn parse_literal(token: &str) -> Value {
    let token = token.trim();

    if token.len() >= 2 && token.starts_with('\'') && token.ends_with('\'') {
        let inner = &token[1..token.len() - 1];
        return Value::String(inner.replace("''", "'"));
    }

    match token.to_ascii_uppercase().as_str() {
        "NULL" => return Value::Null,
        "TRUE" => return Value::Bool(true),
        "FALSE" => return Value::Bool(false),
        _ => {}
    }

    if let Ok(i) = token.parse::<i64>() {
        return Value::Number(i.into());
    }
    if let Ok(f) = token.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }

    // Unquoted and not a known literal; keep the text
    Value::String(token.to_string())
}

/// Parse one statement starting on `line`. Comments and blank text yield `None`.
pub fn parse_insert(text: &str, line: usize) -> ArtifactResult<Option<InsertRow>> {
    let text = text.trim();
    if text.is_empty() || text.starts_with("--") {
        return Ok(None);
    }

    let malformed = |message: &str| ArtifactError::Malformed {
        line,
        message: message.to_string(),
    };

    let rest = text
        .strip_prefix("INSERT INTO")
        .ok_or_else(|| malformed("expected INSERT INTO"))?;

    let open = rest.find('(').ok_or_else(|| malformed("missing column list"))?;
    let table = rest[..open].trim().to_string();
    if table.is_empty() {
        return Err(malformed("missing table name"));
    }

    let close = rest[open..]
        .find(')')
        .map(|i| open + i)
        .ok_or_else(|| malformed("unclosed column list"))?;
    let columns: Vec<String> = rest[open + 1..close]
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();

    let after = rest[close + 1..].trim_start();
    let values_part = after
        .strip_prefix("VALUES")
        .ok_or_else(|| malformed("missing VALUES"))?
        .trim();
    let values_part = values_part.strip_suffix(';').unwrap_or(values_part).trim_end();
    let list = values_part
        .strip_prefix('(')
        .and_then(|v| v.strip_suffix(')'))
        .ok_or_else(|| malformed("value list must be parenthesized"))?;

    let values = split_values(list, line)?;
    if values.len() != columns.len() {
        return Err(ArtifactError::ColumnMismatch {
            line,
            columns: columns.len(),
            values: values.len(),
        });
    }

    let record = columns
        .into_iter()
        .zip(values.iter().map(|v| parse_literal(v)))
        .collect();

    Ok(Some(InsertRow { table, record }))
}

/// Parse a whole SQL file produced by the generator.
pub fn parse_artifact(text: &str) -> ArtifactResult<ParsedArtifact> {
    let mut parsed = ParsedArtifact::default();

    for stmt in split_statements(text)? {
        let Some(row) = parse_insert(&stmt.text, stmt.line)? else {
            continue;
        };

        match parsed.tables.iter_mut().find(|t| t.table == row.table) {
            Some(rows) => rows.records.push(row.record),
            None => parsed.tables.push(TableRows {
                table: row.table,
                records: vec![row.record],
            }),
        }
    }

    Ok(parsed)
}

/// Read and parse a SQL file.
pub fn read_artifact(path: &Path) -> ArtifactResult<ParsedArtifact> {
    let text = std::fs::read_to_string(path)?;
    parse_artifact(&text)
}
