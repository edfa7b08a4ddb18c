//! # Seedsync - markdown JSON seed data to a staging database
//!
//! Seedsync extracts JSON arrays embedded under labeled sections of a
//! markdown document, turns them into SQL `INSERT` statements, and loads
//! them into a staging database with `psql` or through a REST API.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌──────────────┐
//! │  Markdown   │────▶│   Parser    │────▶│  SQL gen    │────▶│  .sql file   │
//! │  document   │     │ (sections)  │     │ (inserts)   │     │              │
//! └─────────────┘     └──────┬──────┘     └─────────────┘     └──────┬───────┘
//!                            │ records                               │
//!                            ▼                                       ▼
//!                     ┌─────────────┐                         ┌──────────────┐
//!                     │  REST push  │                         │ psql apply   │
//!                     └─────────────┘                         └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use seedsync::{generate, GenerateOptions};
//!
//! let report = generate(&GenerateOptions::default()).unwrap();
//! println!("{} statements", report.statement_count());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per step
//! - [`logs`] - Progress logging
//! - [`models`] - Records, sections, migration plan
//! - [`parser`] - Section extraction from markdown
//! - [`sql`] - INSERT generation
//! - [`artifact`] - Reading generated SQL back
//! - [`pipeline`] - Generate step
//! - [`apply`] - `psql` / `pg_dump` step
//! - [`rest`] - REST API step
//! - [`config`] - Connection settings
//! - [`confirm`] - Operator confirmation

// Core modules
pub mod error;
pub mod logs;
pub mod models;

// Generation
pub mod parser;
pub mod pipeline;
pub mod sql;

// Loading
pub mod apply;
pub mod artifact;
pub mod rest;

// Operator interaction
pub mod config;
pub mod confirm;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ApplyError, ArtifactError, ConfigError, ExtractError, PipelineError, PlanError, RestError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{default_plan, MigrationPlan, Record, SectionSpec, TableMapping, Terminator};

// =============================================================================
// Re-exports - Extraction and generation
// =============================================================================

pub use parser::{extract_sections, read_document, Extraction, SectionOutcome, SectionReport};

pub use sql::{
    escape_sql_value, insert_statement, order_columns, project_record, render_artifact, Artifact,
};

pub use pipeline::{generate, records_by_table, GenerateOptions, GenerateReport};

// =============================================================================
// Re-exports - Loading
// =============================================================================

pub use artifact::{parse_artifact, read_artifact, split_statements, ParsedArtifact, TableRows};

pub use apply::{apply_artifact, ApplyOptions, ApplyOutcome, ArtifactSummary};

pub use rest::{push, push_tables, PushOutcome, PushReport, RestClient, TableStatus};

pub use config::{DbTarget, RestCredentials};

pub use confirm::{AutoApprove, Confirm, ConsolePrompt};
