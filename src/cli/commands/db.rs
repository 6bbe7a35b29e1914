//! Database lifecycle commands: init, ingest, status, datasets

use std::path::PathBuf;

use crate::cli::commands::{load_config, runtime};
use crate::cli::error::CliError;
use crate::config::{CONFIG_FILENAME, StatsConfig, sample_config};
use crate::gate::ReadySummary;
use crate::ingest::{DatasetStatus, INGEST_LOG_TABLE, PipelineReport};
use crate::registry::LoadMode;

/// Arguments shared by database commands
#[derive(Debug, Clone)]
pub struct DbArgs {
    /// Workspace path
    pub workspace: PathBuf,
    /// Explicit config file (default: `<workspace>/.hoops.toml`)
    pub config: Option<PathBuf>,
}

/// Write a sample config if none exists, then bring the database up
pub fn handle_init(args: &DbArgs) -> Result<(), CliError> {
    if args.config.is_none() && !StatsConfig::exists(&args.workspace) {
        let path = args.workspace.join(CONFIG_FILENAME);
        std::fs::write(&path, sample_config())
            .map_err(|e| CliError::IoError(format!("Failed to write {}: {}", path.display(), e)))?;
        println!("Wrote {}", path.display());
    }

    let config = load_config(&args.workspace, args.config.as_ref())?;
    initialize(&config, args)
}

/// Re-run the pipeline; `force` ignores already-persisted tables
pub fn handle_ingest(args: &DbArgs, force: bool) -> Result<(), CliError> {
    let mut config = load_config(&args.workspace, args.config.as_ref())?;
    config.ingest.force |= force;
    initialize(&config, args)
}

fn initialize(config: &StatsConfig, args: &DbArgs) -> Result<(), CliError> {
    let db = config.open_database(&args.workspace)?;
    let summary = runtime()?.block_on(db.initialize())?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &ReadySummary) {
    if summary.from_cache {
        println!("Database already populated; nothing fetched (use --force to re-ingest)");
    }
    if let Some(report) = &summary.report {
        print_report(report);
    }
    if summary.is_degraded() {
        println!("Ready without: {}", summary.missing_tables.join(", "));
    } else {
        println!("Ready");
    }
}

fn print_report(report: &PipelineReport) {
    println!("Ingest run {}", report.ingest.run_id);
    for dataset in &report.ingest.datasets {
        let detail = match &dataset.status {
            DatasetStatus::Loaded {
                rows,
                missing_columns,
            } if missing_columns.is_empty() => format!("{} rows", rows),
            DatasetStatus::Loaded {
                rows,
                missing_columns,
            } => format!("{} rows (no header for {})", rows, missing_columns.join(", ")),
            other => match dataset.detail() {
                Some(detail) => format!("{}: {}", other.label(), detail),
                None => other.label().to_string(),
            },
        };
        println!("  {:<32} {:<30} {}", dataset.source_file, dataset.target_table, detail);
    }

    println!("Consolidated tables:");
    for built in &report.consolidation.built {
        if built.rejected_duplicates > 0 {
            println!(
                "  {:<20} {} rows ({} duplicates rejected)",
                built.table.name(),
                built.rows,
                built.rejected_duplicates
            );
        } else {
            println!("  {:<20} {} rows", built.table.name(), built.rows);
        }
    }
    for (table, error) in &report.consolidation.failed {
        println!("  {:<20} not built: {}", table.name(), error);
    }
}

/// Show configuration, table counts and the most recent ingest run
pub fn handle_status(args: &DbArgs) -> Result<(), CliError> {
    let config = load_config(&args.workspace, args.config.as_ref())?;
    let db = config.open_database(&args.workspace)?;

    match config.database_path(&args.workspace) {
        Some(path) => println!("Database: {}", path.display()),
        None => println!("Database: in memory"),
    }
    println!("Source:   {}", db.pipeline().source().describe());
    println!();

    for (table, count) in db.table_counts()? {
        match count {
            Some(rows) => println!("  {:<20} {} rows", table.name(), rows),
            None => println!("  {:<20} missing", table.name()),
        }
    }

    let engine = db.engine();
    if engine.table_exists(INGEST_LOG_TABLE)? {
        let last = engine.query(
            &format!(
                "SELECT dataset, status, \"rows\", detail, logged_at FROM {log} \
                 WHERE run_id = (SELECT run_id FROM {log} ORDER BY logged_at DESC LIMIT 1) \
                 ORDER BY dataset",
                log = INGEST_LOG_TABLE
            ),
            &[],
        )?;
        if !last.is_empty() {
            println!();
            println!("Last ingest:");
            println!(
                "{}",
                crate::query::format_query_result(&last, crate::query::OutputFormat::Table)
            );
        }
    }

    Ok(())
}

/// List the datasets the registry loads
pub fn handle_datasets(args: &DbArgs) -> Result<(), CliError> {
    let config = load_config(&args.workspace, args.config.as_ref())?;
    let registry = config.build_registry(&args.workspace)?;

    for dataset in registry.iter() {
        let mode = match &dataset.mode {
            LoadMode::Explicit { columns } => format!("explicit, {} columns", columns.len()),
            LoadMode::Auto => "auto".to_string(),
        };
        let required = if dataset.optional { "optional" } else { "required" };
        println!(
            "  {:<32} -> {:<30} ({}, {})",
            dataset.source_file, dataset.target_table, mode, required
        );
    }

    Ok(())
}
