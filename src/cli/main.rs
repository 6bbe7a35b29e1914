//! CLI binary entry point for hoops

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hoops_stats::cli::commands::db::{
    DbArgs, handle_datasets, handle_ingest, handle_init, handle_status,
};
use hoops_stats::cli::commands::query::{QueryArgs, handle_query};

#[derive(Parser)]
#[command(name = "hoops")]
#[command(about = "Load and query historical basketball statistics")]
#[command(version)]
struct Cli {
    /// Workspace path (default: current directory)
    #[arg(short, long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Config file (default: <workspace>/.hoops.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a sample config if missing and populate the database
    Init,

    /// Fetch and load every dataset
    Ingest {
        /// Re-ingest even if tables already exist
        #[arg(short, long)]
        force: bool,
    },

    /// Show table row counts and the last ingest run
    Status,

    /// List the datasets the registry loads
    Datasets,

    /// Execute a SQL query
    Query {
        /// SQL query to execute
        sql: String,
        /// Positional parameter (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,
        /// Output format (table, json, csv)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "hoops_stats=debug" } else { "hoops_stats=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let db_args = DbArgs {
        workspace: cli.workspace.clone(),
        config: cli.config.clone(),
    };

    match cli.command {
        Commands::Init => handle_init(&db_args).context("init failed"),
        Commands::Ingest { force } => handle_ingest(&db_args, force).context("ingest failed"),
        Commands::Status => handle_status(&db_args).context("status failed"),
        Commands::Datasets => handle_datasets(&db_args).context("listing datasets failed"),
        Commands::Query {
            sql,
            params,
            format,
        } => {
            let args = QueryArgs {
                sql,
                params,
                workspace: cli.workspace,
                config: cli.config,
                format,
            };
            handle_query(&args).context("query failed")
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
