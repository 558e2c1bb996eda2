//! Salesline CLI - process sales extracts and publish them

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{logs, run, status};

/// Salesline - sales extract ingestion and ownership reattribution
#[derive(Parser)]
#[command(name = "sl", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the five extracts and publish the result
    Run {
        /// Previous-year sales extract
        #[arg(long)]
        previous_year: Option<PathBuf>,
        /// Current-year history sales extract
        #[arg(long)]
        current_year: Option<PathBuf>,
        /// Current-month sales extract
        #[arg(long)]
        current_month: Option<PathBuf>,
        /// Client extract
        #[arg(long)]
        clients: Option<PathBuf>,
        /// Product extract
        #[arg(long)]
        products: Option<PathBuf>,
        /// Process only; publish nothing
        #[arg(long)]
        dry_run: bool,
        /// Write <table>.jsonl files into this directory instead of the database
        #[arg(long, short)]
        output: Option<PathBuf>,
        /// Skip the confirmation before tables are replaced
        #[arg(long, short)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show row counts of the stored tables
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect and prune the run log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

/// Diagnostics go to stderr, filtered by SALESLINE_LOG (default: warn)
fn init_tracing() {
    let filter = EnvFilter::try_from_env("SALESLINE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&format!("{:#}", e));
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run {
            previous_year,
            current_year,
            current_month,
            clients,
            products,
            dry_run,
            output,
            yes,
            json,
        } => {
            let inputs = salesline_core::InputBundle {
                previous_year,
                current_year_history: current_year,
                current_month,
                clients,
                products,
            };
            let destination = match (dry_run, output) {
                (true, _) => run::Destination::None,
                (false, Some(dir)) => run::Destination::JsonLines(dir),
                (false, None) => run::Destination::Database,
            };
            run::run(inputs, destination, yes, json)
        }
        Commands::Status { json } => status::run(json),
        Commands::Logs { command } => logs::run(command),
    }
}
