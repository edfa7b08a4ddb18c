//! Error types for the seedsync migration steps.
//!
//! One enum per concern, following the stages of a run:
//!
//! - [`ExtractError`] - Reading and decoding the source document
//! - [`PlanError`] - Invalid migration plan (sections / table mappings)
//! - [`ArtifactError`] - Malformed statements in a generated SQL file
//! - [`ApplyError`] - Running the SQL file through `psql` / `pg_dump`
//! - [`RestError`] - REST API calls
//! - [`ConfigError`] - Missing or unusable connection settings
//! - [`PipelineError`] - Top-level generation errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.
//!
//! A section that is missing from the document, or whose JSON block does not
//! parse, is not an error: it is reported through
//! [`crate::parser::SectionOutcome`] and skipped.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Extraction Errors
// =============================================================================

/// Errors while loading the source document.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Failed to read file.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to decode the document bytes.
    #[error("Failed to decode document as {encoding}: {message}")]
    Encoding { encoding: String, message: String },
}

// =============================================================================
// Plan Errors
// =============================================================================

/// Errors in a migration plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Plan JSON could not be parsed.
    #[error("Invalid plan JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to read plan file.
    #[error("Failed to read plan file: {0}")]
    Io(#[from] std::io::Error),

    /// Two sections share a name.
    #[error("Duplicate section name: {0}")]
    DuplicateSection(String),

    /// A table mapping points at a section the plan does not define.
    #[error("Table '{table}' maps unknown section '{section}'")]
    UnknownSection { section: String, table: String },

    /// A section label is empty.
    #[error("Section '{0}' has an empty label")]
    EmptyLabel(String),

    /// A table name is not a plain SQL identifier.
    #[error("Invalid table name: {0}")]
    InvalidTable(String),
}

// =============================================================================
// Artifact Errors
// =============================================================================

/// Errors while reading back a generated SQL file.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// A quoted literal never closes.
    #[error("Line {line}: unterminated string literal")]
    UnterminatedString { line: usize },

    /// The statement is not `INSERT INTO t (...) VALUES (...);`.
    #[error("Line {line}: malformed INSERT statement: {message}")]
    Malformed { line: usize, message: String },

    /// Column and value lists differ in length.
    #[error("Line {line}: {columns} columns but {values} values")]
    ColumnMismatch {
        line: usize,
        columns: usize,
        values: usize,
    },

    /// IO error.
    #[error("Artifact IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Apply Errors
// =============================================================================

/// Errors while applying the SQL file to a database.
#[derive(Debug, Error)]
pub enum ApplyError {
    /// The generated SQL file does not exist.
    #[error("SQL file not found: {0} (run `seedsync generate` first)")]
    ArtifactMissing(PathBuf),

    /// External tool is not installed.
    #[error("{0} command not found. Please ensure PostgreSQL client tools are installed.")]
    ToolNotFound(String),

    /// External tool exited with a non-zero status.
    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    /// The operator declined to continue without a backup.
    #[error("Aborted: backup failed and operator declined to continue")]
    BackupDeclined,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// REST Errors
// =============================================================================

/// Errors from the REST API.
#[derive(Debug, Error)]
pub enum RestError {
    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Service key cannot be sent as a header value.
    #[error("Service key is not a valid header value")]
    InvalidKey,
}

// =============================================================================
// Config Errors
// =============================================================================

/// Missing, empty or unusable connection settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither flag, environment nor prompt provided a value.
    #[error("No value provided for {0}")]
    Missing(String),

    /// A value was provided but cannot be used.
    #[error("Invalid value for {name}: {message}")]
    Invalid { name: String, message: String },

    /// Reading the interactive answer failed.
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level errors of the generate step.
///
/// This is the error type returned by [`crate::pipeline::generate`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Document loading error.
    #[error("Extract error: {0}")]
    Extract(#[from] ExtractError),

    /// Plan error.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// No section could be extracted; nothing was written.
    #[error("No data extracted from {0}")]
    NothingExtracted(PathBuf),

    /// Failed to write the SQL file.
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for plan operations.
pub type PlanResult<T> = Result<T, PlanError>;

/// Result type for artifact parsing.
pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// Result type for apply operations.
pub type ApplyResult<T> = Result<T, ApplyError>;

/// Result type for REST operations.
pub type RestResult<T> = Result<T, RestError>;

/// Result type for the generate pipeline.
pub type PipelineResult<T> = Result<T, PipelineError>;
