//! Seedsync CLI - move markdown seed data into a staging database
//!
//! # Commands
//!
//! ```bash
//! seedsync generate                 # production-missing-data.md → production_data_inserts.sql
//! seedsync apply                    # psql -f production_data_inserts.sql (with pg_dump backup)
//! seedsync push --source doc.md     # clear + insert through the REST API
//! seedsync inspect                  # per-table statement counts of the SQL file
//! seedsync plan                     # show the built-in section/table plan
//! ```

use clap::{Parser, Subcommand};
use seedsync::apply::DEFAULT_PREVIEW_LINES;
use seedsync::pipeline::{extract_document, DEFAULT_INPUT, DEFAULT_OUTPUT};
use seedsync::{
    apply_artifact, config, default_plan, generate, push, read_artifact, records_by_table,
    rest::manual_steps, ApplyOptions, ApplyOutcome, ArtifactSummary, AutoApprove, Confirm,
    ConsolePrompt, GenerateOptions, MigrationPlan, PushOutcome, RestClient, TableRows,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "seedsync")]
#[command(about = "Move JSON seed data embedded in markdown into a staging database", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract JSON sections from the markdown document and write SQL inserts
    Generate {
        /// Source markdown document
        #[arg(short, long, default_value = DEFAULT_INPUT)]
        input: PathBuf,

        /// SQL file to write
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        output: PathBuf,

        /// Plan JSON file (default: built-in plan)
        #[arg(short, long)]
        plan: Option<PathBuf>,
    },

    /// Execute the SQL file against the staging database with psql
    Apply {
        /// SQL file to execute
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        artifact: PathBuf,

        /// Connection string (default: $STAGING_DB_CONNECTION, else prompt)
        #[arg(long)]
        db: Option<String>,

        /// Skip the confirmation prompts
        #[arg(short, long)]
        yes: bool,

        /// Do not run pg_dump first
        #[arg(long)]
        no_backup: bool,

        /// Directory for the pg_dump file
        #[arg(long, default_value = ".")]
        backup_dir: PathBuf,

        /// Stop at the first failing statement
        #[arg(long)]
        stop_on_error: bool,

        /// psql executable
        #[arg(long, default_value = "psql")]
        psql_bin: String,

        /// pg_dump executable
        #[arg(long, default_value = "pg_dump")]
        pg_dump_bin: String,
    },

    /// Clear staging tables through the REST API, optionally re-inserting records
    Push {
        /// Generated SQL file
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        artifact: PathBuf,

        /// REST base URL (default: $SUPABASE_URL, else prompt)
        #[arg(long)]
        url: Option<String>,

        /// Service key (default: $SUPABASE_SERVICE_KEY, else prompt)
        #[arg(long)]
        key: Option<String>,

        /// Insert records parsed from this markdown document
        #[arg(short, long, conflicts_with = "from_artifact")]
        source: Option<PathBuf>,

        /// Insert records read back from the SQL file
        #[arg(long)]
        from_artifact: bool,

        /// Plan JSON file (default: built-in plan)
        #[arg(short, long)]
        plan: Option<PathBuf>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show size, preview and per-table counts of a SQL file
    Inspect {
        /// SQL file
        #[arg(short, long, default_value = DEFAULT_OUTPUT)]
        artifact: PathBuf,
    },

    /// Print the built-in plan as JSON
    Plan,
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate { input, output, plan } => cmd_generate(input, output, plan.as_deref()),

        Commands::Apply {
            artifact,
            db,
            yes,
            no_backup,
            backup_dir,
            stop_on_error,
            psql_bin,
            pg_dump_bin,
        } => {
            let options = ApplyOptions {
                psql_bin,
                pg_dump_bin,
                backup: !no_backup,
                backup_dir,
                stop_on_error,
                preview_lines: DEFAULT_PREVIEW_LINES,
            };
            cmd_apply(&artifact, db, &options, yes)
        }

        Commands::Push {
            artifact,
            url,
            key,
            source,
            from_artifact,
            plan,
            yes,
        } => {
            cmd_push(
                &artifact,
                url,
                key,
                source.as_deref(),
                from_artifact,
                plan.as_deref(),
                yes,
            )
            .await
        }

        Commands::Inspect { artifact } => cmd_inspect(&artifact),

        Commands::Plan => cmd_plan(),
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn load_plan(path: Option<&Path>) -> Result<MigrationPlan, Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            eprintln!("📋 Using plan: {}", p.display());
            Ok(MigrationPlan::from_file(p)?)
        }
        None => Ok(default_plan()),
    }
}

fn confirmer(yes: bool) -> Box<dyn Confirm> {
    if yes {
        Box::new(AutoApprove)
    } else {
        Box::new(ConsolePrompt)
    }
}

fn cmd_generate(
    input: PathBuf,
    output: PathBuf,
    plan: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let options = GenerateOptions {
        input,
        output,
        plan: load_plan(plan)?,
    };

    let report = generate(&options)?;
    eprintln!(
        "\n✨ Done! {} statements for {} tables",
        report.statement_count(),
        report.tables.len()
    );
    Ok(())
}

fn cmd_apply(
    artifact: &Path,
    db: Option<String>,
    options: &ApplyOptions,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Fail on a missing file before asking for credentials
    if !artifact.exists() {
        return Err(seedsync::ApplyError::ArtifactMissing(artifact.to_path_buf()).into());
    }

    let target = config::db_target(db)?;
    let confirm = confirmer(yes);

    match apply_artifact(artifact, &target, options, confirm.as_ref())? {
        ApplyOutcome::Cancelled => eprintln!("❌ Operation cancelled"),
        ApplyOutcome::Applied { .. } => {
            eprintln!("\n✅ Staging database updated successfully!");
            eprintln!("🎉 Process completed!");
        }
    }
    Ok(())
}

async fn cmd_push(
    artifact: &Path,
    url: Option<String>,
    key: Option<String>,
    source: Option<&Path>,
    from_artifact: bool,
    plan: Option<&Path>,
    yes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let credentials = config::rest_credentials(url, key)?;
    let plan = load_plan(plan)?;

    // Shown before the confirmation prompt
    ArtifactSummary::load(artifact, DEFAULT_PREVIEW_LINES)?.log();
    eprintln!("🎯 Target: {}", credentials.url);

    let rows: Option<Vec<TableRows>> = match (source, from_artifact) {
        (Some(doc), _) => {
            let extraction = extract_document(doc, &plan)?;
            Some(records_by_table(&plan, &extraction))
        }
        (None, true) => Some(read_artifact(artifact)?.tables),
        (None, false) => None,
    };

    let client = RestClient::new(credentials);
    let tables: Vec<String> = plan.table_names().into_iter().map(String::from).collect();
    let confirm = confirmer(yes);

    let report = match push(&client, &tables, rows.as_deref(), confirm.as_ref()).await {
        PushOutcome::Cancelled => {
            eprintln!("❌ Operation cancelled");
            return Ok(());
        }
        PushOutcome::Done(report) => report,
    };

    if rows.is_none() {
        eprintln!("\n📋 Next Steps:");
        for step in manual_steps(client.base_url(), artifact) {
            eprintln!("   {}", step);
        }
        eprintln!("\n🎉 Tables are ready for data insertion!");
    } else if report.failures() == 0 {
        eprintln!("\n🎉 Staging tables refreshed!");
    } else {
        eprintln!("\n⚠️  {} table(s) failed, see above", report.failures());
    }
    Ok(())
}

fn cmd_inspect(artifact: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let summary = ArtifactSummary::load(artifact, DEFAULT_PREVIEW_LINES)?;
    summary.log();

    let parsed = read_artifact(artifact)?;
    println!("\n📦 Tables ({}):", parsed.tables.len());
    for table in &parsed.tables {
        println!("   {}: {} rows", table.table, table.records.len());
    }
    Ok(())
}

fn cmd_plan() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", default_plan().to_json()?);
    Ok(())
}
