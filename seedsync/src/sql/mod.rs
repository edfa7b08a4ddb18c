//! SQL INSERT generation.
//!
//! Turns parsed sections into the SQL file handed to the apply step:
//!
//! ```text
//! -- SQL INSERT statements generated from production-missing-data.md
//! -- Generated on: 2024-05-02 14:03:11.482113
//!
//! -- INSERT statements for categories
//! INSERT INTO categories (id, name) VALUES (1, 'Dairy');
//! INSERT INTO categories (id, name) VALUES (2, 'Produce');
//!
//! ```
//!
//! Columns come from the first record of each section: priority columns
//! first, the rest alphabetical. Keys missing from later records are `NULL`.

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use serde_json::Value;

use crate::models::{MigrationPlan, Record};
use crate::parser::Extraction;

/// Timestamp format of the header line
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Render a JSON scalar as a SQL literal.
///
/// Strings are single-quoted with embedded quotes doubled. Arrays and
/// objects are written as their JSON text, quoted the same way.
pub fn escape_sql_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        other => quote(&other.to_string()),
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Column order for a table, derived from its first record.
pub fn order_columns(sample: &Record, priority: &[String]) -> Vec<String> {
    let mut columns: Vec<String> = priority
        .iter()
        .filter(|col| sample.contains_key(col.as_str()))
        .cloned()
        .collect();

    let mut others: Vec<String> = sample
        .keys()
        .filter(|key| !priority.contains(key))
        .cloned()
        .collect();
    others.sort();

    columns.extend(others);
    columns
}

/// The row a statement writes: `columns` in order, absent keys as null,
/// keys outside `columns` dropped.
pub fn project_record(columns: &[String], record: &Record) -> Record {
    columns
        .iter()
        .map(|col| (col.clone(), record.get(col).cloned().unwrap_or(Value::Null)))
        .collect()
}

/// One `INSERT INTO` statement.
pub fn insert_statement(table: &str, columns: &[String], record: &Record) -> String {
    let values: Vec<String> = columns
        .iter()
        .map(|col| record.get(col).map_or_else(|| "NULL".to_string(), escape_sql_value))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({});",
        table,
        columns.join(", "),
        values.join(", ")
    )
}

/// Comment line, one statement per record, and a trailing blank line.
pub fn table_block(table: &str, columns: &[String], records: &[Record]) -> String {
    if records.is_empty() {
        return format!("-- No data for {}\n", table);
    }

    let mut lines = Vec::with_capacity(records.len() + 2);
    lines.push(format!("-- INSERT statements for {}", table));
    lines.extend(records.iter().map(|r| insert_statement(table, columns, r)));
    lines.push(String::new());
    lines.join("\n")
}

/// Statements written for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub section: String,
    pub table: String,
    pub columns: Vec<String>,
    pub statements: usize,
}

/// Generated SQL text with per-table counts.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub text: String,
    pub tables: Vec<TableSummary>,
}

impl Artifact {
    pub fn statement_count(&self) -> usize {
        self.tables.iter().map(|t| t.statements).sum()
    }
}

/// Render the SQL file for every mapped section that produced records.
///
/// Tables appear in mapping order. Sections without a mapping are dropped.
pub fn render_artifact<Tz>(
    plan: &MigrationPlan,
    extraction: &Extraction,
    generated_at: &DateTime<Tz>,
) -> Artifact
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let mut parts = vec![
        format!("-- SQL INSERT statements generated from {}", plan.source_name),
        format!("-- Generated on: {}", generated_at.format(TIMESTAMP_FORMAT)),
        String::new(),
    ];
    let mut tables = Vec::new();

    for mapping in &plan.tables {
        let Some(records) = extraction.records(&mapping.section) else {
            continue;
        };
        let Some(first) = records.first() else {
            continue;
        };

        let columns = order_columns(first, &plan.priority_columns);
        parts.push(table_block(&mapping.table, &columns, records));
        tables.push(TableSummary {
            section: mapping.section.clone(),
            table: mapping.table.clone(),
            columns,
            statements: records.len(),
        });
    }

    Artifact {
        text: parts.join("\n"),
        tables,
    }
}
