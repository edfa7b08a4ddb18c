//! Generate step: markdown document → SQL file.
//!
//! # Example
//!
//! ```rust,ignore
//! use seedsync::pipeline::{generate, GenerateOptions};
//!
//! let report = generate(&GenerateOptions::default())?;
//! println!("Wrote {} statements", report.statement_count());
//! ```

use chrono::Local;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::artifact::TableRows;
use crate::error::{PipelineError, PipelineResult};
use crate::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::models::{default_plan, MigrationPlan};
use crate::parser::{extract_sections, read_document, Extraction, SectionOutcome};
use crate::sql::{order_columns, project_record, render_artifact, TableSummary};

/// Default source document
pub const DEFAULT_INPUT: &str = "production-missing-data.md";
/// Default SQL file
pub const DEFAULT_OUTPUT: &str = "production_data_inserts.sql";

/// Options for [`generate`].
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub input: PathBuf,
    pub output: PathBuf,
    pub plan: MigrationPlan,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            input: PathBuf::from(DEFAULT_INPUT),
            output: PathBuf::from(DEFAULT_OUTPUT),
            plan: default_plan(),
        }
    }
}

/// Per-section counts of a generate run.
#[derive(Debug, Clone, Serialize)]
pub struct SectionCount {
    pub section: String,
    /// Destination table, or the section name when unmapped
    pub table: String,
    pub records: usize,
}

/// Summary of a generate run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateReport {
    pub output: PathBuf,
    /// Sections that parsed
    pub sections_processed: usize,
    /// Records over all parsed sections, mapped or not
    pub total_records: usize,
    pub sections: Vec<SectionCount>,
    /// Tables written to the SQL file
    pub tables: Vec<TableSummary>,
}

impl GenerateReport {
    pub fn statement_count(&self) -> usize {
        self.tables.iter().map(|t| t.statements).sum()
    }
}

/// Load the document and extract the plan's sections, logging each outcome.
pub fn extract_document(input: &Path, plan: &MigrationPlan) -> PipelineResult<Extraction> {
    plan.validate()?;

    log_info(format!("Extracting JSON data from {}...", input.display()));
    let content = read_document(input)?;
    let extraction = extract_sections(&content, &plan.sections);
    log_extraction(&extraction);

    Ok(extraction)
}

fn log_extraction(extraction: &Extraction) {
    for report in &extraction.reports {
        match &report.outcome {
            SectionOutcome::Parsed(records) => {
                log_success(format!("Extracted {} records from {}", records.len(), report.name))
            }
            SectionOutcome::Malformed { error, snippet } => {
                log_error(format!("Error parsing {}: {}", report.name, error));
                log_info_indent(format!("JSON snippet: {}", snippet), 1);
            }
            SectionOutcome::Missing => log_error(format!("Section {} not found", report.name)),
        }
    }
}

/// Rows of every mapped section, keyed by destination table.
///
/// Each record is reshaped to the columns its `INSERT` statement uses, so
/// these are the rows the SQL file would write.
pub fn records_by_table(plan: &MigrationPlan, extraction: &Extraction) -> Vec<TableRows> {
    plan.tables
        .iter()
        .filter_map(|mapping| {
            let records = extraction.records(&mapping.section)?;
            let columns = order_columns(records.first()?, &plan.priority_columns);
            Some(TableRows {
                table: mapping.table.clone(),
                records: records.iter().map(|r| project_record(&columns, r)).collect(),
            })
        })
        .collect()
}

/// Extract the document and write the SQL file.
///
/// Nothing is written when no section could be extracted.
pub fn generate(options: &GenerateOptions) -> PipelineResult<GenerateReport> {
    let plan = &options.plan;
    let extraction = extract_document(&options.input, plan)?;

    if extraction.is_empty() {
        log_warning("No data extracted. Exiting.");
        return Err(PipelineError::NothingExtracted(options.input.clone()));
    }

    log_info("Generating SQL INSERT statements...");
    let artifact = render_artifact(plan, &extraction, &Local::now());

    std::fs::write(&options.output, &artifact.text).map_err(|source| PipelineError::Write {
        path: options.output.clone(),
        source,
    })?;
    log_success(format!(
        "SQL INSERT statements written to {}",
        options.output.display()
    ));

    let sections: Vec<SectionCount> = extraction
        .parsed()
        .filter(|(_, records)| !records.is_empty())
        .map(|(name, records)| SectionCount {
            section: name.to_string(),
            table: plan.table_for(name).unwrap_or(name).to_string(),
            records: records.len(),
        })
        .collect();

    let report = GenerateReport {
        output: options.output.clone(),
        sections_processed: extraction.extracted_count(),
        total_records: extraction.total_records(),
        sections,
        tables: artifact.tables,
    };
    log_summary(&report);

    Ok(report)
}

fn log_summary(report: &GenerateReport) {
    log_info("Summary:");
    log_info_indent(format!("Total sections processed: {}", report.sections_processed), 1);
    log_info_indent(format!("Total records: {}", report.total_records), 1);
    for section in &report.sections {
        log_info_indent(format!("{}: {} records", section.table, section.records), 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const DOC: &str = "Notes about missing production data.\n\n\
Categories -\n\
[\n  {\"id\": 1, \"name\": \"Dairy\"},\n  {\"id\": 2, \"name\": \"Produce\"}\n]\n\n\
Labels -\n\
[{\"id\": 1, \"text\": \"Organic\"}]\n\n\
Orders -\n\
[{\"id\": 1, \"total\": }]\n\n";

    fn options(dir: &Path, doc: &str) -> GenerateOptions {
        let input = dir.join("seed.md");
        std::fs::write(&input, doc).unwrap();
        GenerateOptions {
            input,
            output: dir.join("inserts.sql"),
            plan: default_plan(),
        }
    }

    #[test]
    fn test_generate_writes_file() {
        let dir = tempdir().unwrap();
        let opts = options(dir.path(), DOC);
        let report = generate(&opts).unwrap();

        let sql = std::fs::read_to_string(&opts.output).unwrap();
        assert!(sql.contains("INSERT INTO categories (id, name) VALUES (1, 'Dairy');"));
        assert!(!sql.contains("labels"));
        assert_eq!(report.statement_count(), 2);
        assert_eq!(report.sections_processed, 2);
        assert_eq!(report.total_records, 3);
    }

    #[test]
    fn test_unmapped_section_listed_under_own_name() {
        let dir = tempdir().unwrap();
        let report = generate(&options(dir.path(), DOC)).unwrap();
        let labels = report.sections.iter().find(|s| s.section == "labels").unwrap();
        assert_eq!(labels.table, "labels");
        assert_eq!(labels.records, 1);
    }

    #[test]
    fn test_nothing_extracted_writes_nothing() {
        let dir = tempdir().unwrap();
        let opts = options(dir.path(), "no sections here\n");
        let err = generate(&opts).unwrap_err();

        assert!(matches!(err, PipelineError::NothingExtracted(_)));
        assert!(!opts.output.exists());
    }

    #[test]
    fn test_missing_input() {
        let dir = tempdir().unwrap();
        let opts = GenerateOptions {
            input: dir.path().join("absent.md"),
            output: dir.path().join("out.sql"),
            plan: default_plan(),
        };
        assert!(matches!(generate(&opts), Err(PipelineError::Extract(_))));
    }

    #[test]
    fn test_records_by_table_skips_unmapped() {
        let plan = default_plan();
        let extraction = extract_sections(DOC, &plan.sections);
        let rows = records_by_table(&plan, &extraction);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].table, "categories");
        assert_eq!(rows[0].records.len(), 2);
    }

    #[test]
    fn test_records_by_table_match_sql_rows() {
        let doc = "Categories -\n\
[{\"id\": 1, \"name\": \"A\"}, {\"id\": 2, \"email\": \"b@x\"}]\n\n";
        let plan = default_plan();
        let extraction = extract_sections(doc, &plan.sections);
        let rows = records_by_table(&plan, &extraction);

        let sql = render_artifact(&plan, &extraction, &Local::now());
        let written = crate::artifact::parse_artifact(&sql.text).unwrap();

        assert_eq!(rows[0].records, written.records("categories").unwrap());
        assert_eq!(rows[0].records[1]["name"], serde_json::Value::Null);
        assert!(!rows[0].records[1].contains_key("email"));
    }
}
