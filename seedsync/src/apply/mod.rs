//! Apply a generated SQL file with the PostgreSQL command-line tools.
//!
//! ```text
//! summary + preview → confirm → pg_dump backup (best effort) → psql -f file
//! ```
//!
//! Both tools run as child processes; their exit status and captured
//! output decide success. Nothing is retried.

use chrono::{DateTime, Local};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::artifact::{count_inserts, first_inserts};
use crate::config::DbTarget;
use crate::confirm::Confirm;
use crate::error::{ApplyError, ApplyResult};
use crate::logs::{log_error, log_info, log_info_indent, log_success, log_warning};

/// Lines of the SQL file shown before asking for confirmation
pub const DEFAULT_PREVIEW_LINES: usize = 5;
/// `INSERT` statements shown before asking for confirmation
pub const SAMPLE_INSERTS: usize = 3;

/// Size, statement count and first lines of a SQL file.
#[derive(Debug, Clone)]
pub struct ArtifactSummary {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub insert_count: usize,
    pub preview: Vec<String>,
    /// First [`SAMPLE_INSERTS`] statements
    pub sample_inserts: Vec<String>,
}

impl ArtifactSummary {
    /// Read a SQL file; it must exist.
    pub fn load(path: &Path, preview_lines: usize) -> ApplyResult<Self> {
        if !path.exists() {
            return Err(ApplyError::ArtifactMissing(path.to_path_buf()));
        }

        let size_bytes = std::fs::metadata(path)?.len();
        let text = std::fs::read_to_string(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            size_bytes,
            insert_count: count_inserts(&text),
            preview: text
                .lines()
                .take(preview_lines)
                .map(|l| l.trim_end().to_string())
                .collect(),
            sample_inserts: first_inserts(&text, SAMPLE_INSERTS),
        })
    }

    pub fn log(&self) {
        log_info(format!(
            "📄 SQL file: {} ({} bytes)",
            self.path.display(),
            self.size_bytes
        ));
        log_info(format!("📊 Total SQL statements: {}", self.insert_count));
        log_info(format!("📝 Preview (first {} lines):", self.preview.len()));
        for (i, line) in self.preview.iter().enumerate() {
            log_info_indent(format!("{}: {}", i + 1, line), 1);
        }
        if !self.sample_inserts.is_empty() {
            log_info(format!("🔍 First {} INSERT statements:", self.sample_inserts.len()));
            for stmt in &self.sample_inserts {
                log_info_indent(stmt, 1);
            }
        }
    }
}

/// Tool locations and switches for [`apply_artifact`].
#[derive(Debug, Clone)]
pub struct ApplyOptions {
    /// `psql` executable
    pub psql_bin: String,
    /// `pg_dump` executable
    pub pg_dump_bin: String,
    /// Dump the database before applying
    pub backup: bool,
    /// Directory for the dump file
    pub backup_dir: PathBuf,
    /// Pass `-v ON_ERROR_STOP=1` so the first failing statement fails the run
    pub stop_on_error: bool,
    /// Lines shown in the preview
    pub preview_lines: usize,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            psql_bin: "psql".to_string(),
            pg_dump_bin: "pg_dump".to_string(),
            backup: true,
            backup_dir: PathBuf::from("."),
            stop_on_error: false,
            preview_lines: DEFAULT_PREVIEW_LINES,
        }
    }
}

/// Captured result of a successful tool run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// How an apply run ended.
#[derive(Debug, Clone)]
pub enum ApplyOutcome {
    /// Operator declined at the first prompt; nothing was touched.
    Cancelled,
    /// `psql` succeeded.
    Applied {
        backup: Option<PathBuf>,
        output: ToolOutput,
    },
}

/// Run an external tool, mapping spawn and exit failures to [`ApplyError`].
pub fn run_tool(bin: &str, args: &[&str]) -> ApplyResult<ToolOutput> {
    let output = Command::new(bin).args(args).output().map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            ApplyError::ToolNotFound(bin.to_string())
        } else {
            ApplyError::Io(e)
        }
    })?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    if !output.status.success() {
        return Err(ApplyError::ToolFailed {
            tool: bin.to_string(),
            status: output.status.to_string(),
            stderr: stderr.trim().to_string(),
        });
    }

    Ok(ToolOutput { stdout, stderr })
}

/// `staging_backup_YYYYmmdd_HHMMSS.sql`
pub fn backup_file_name(now: &DateTime<Local>) -> String {
    format!("staging_backup_{}.sql", now.format("%Y%m%d_%H%M%S"))
}

/// Dump the target database with `pg_dump`.
pub fn run_backup(
    target: &DbTarget,
    options: &ApplyOptions,
    now: &DateTime<Local>,
) -> ApplyResult<PathBuf> {
    let backup_file = options.backup_dir.join(backup_file_name(now));
    let backup_str = backup_file.to_string_lossy().into_owned();

    log_info(format!("Creating backup: {}", backup_file.display()));
    run_tool(
        &options.pg_dump_bin,
        &[target.connection(), "-f", backup_str.as_str()],
    )?;
    log_success(format!("Backup created: {}", backup_file.display()));

    Ok(backup_file)
}

/// Execute a SQL file with `psql`.
pub fn run_sql_file(
    target: &DbTarget,
    sql_file: &Path,
    options: &ApplyOptions,
) -> ApplyResult<ToolOutput> {
    let sql_str = sql_file.to_string_lossy().into_owned();
    let mut args = vec![target.connection()];
    if options.stop_on_error {
        args.extend(["-v", "ON_ERROR_STOP=1"]);
    }
    args.extend(["-f", sql_str.as_str()]);

    log_info(format!("Executing {}...", sql_file.display()));
    let output = run_tool(&options.psql_bin, &args)?;
    log_success("SQL executed successfully");

    Ok(output)
}

/// Summarize, confirm, back up and apply a SQL file.
pub fn apply_artifact(
    sql_file: &Path,
    target: &DbTarget,
    options: &ApplyOptions,
    confirm: &dyn Confirm,
) -> ApplyResult<ApplyOutcome> {
    let summary = ArtifactSummary::load(sql_file, options.preview_lines)?;
    summary.log();

    log_info(format!("🎯 Target database: {}", target));
    if !confirm.confirm("⚠️  This will update the staging database. Continue?") {
        log_warning("Operation cancelled");
        return Ok(ApplyOutcome::Cancelled);
    }

    let backup = if options.backup {
        log_info("📦 Creating backup...");
        match run_backup(target, options, &Local::now()) {
            Ok(path) => Some(path),
            Err(e) => {
                log_error(format!("Error creating backup: {}", e));
                if !confirm.confirm("Continue without backup?") {
                    return Err(ApplyError::BackupDeclined);
                }
                log_warning("Continuing without backup...");
                None
            }
        }
    } else {
        log_info("Backup skipped");
        None
    };

    log_info("🚀 Updating staging database...");
    match run_sql_file(target, sql_file, options) {
        Ok(output) => {
            if !output.stdout.trim().is_empty() {
                log_info(format!("Output: {}", output.stdout.trim()));
            }
            if let Some(ref path) = backup {
                log_info(format!("📦 Backup available: {}", path.display()));
            }
            Ok(ApplyOutcome::Applied { backup, output })
        }
        Err(e) => {
            log_error(format!("Error executing SQL: {}", e));
            if let Some(ref path) = backup {
                log_info(format!("📦 You can restore from backup: {}", path.display()));
            }
            Err(e)
        }
    }
}
