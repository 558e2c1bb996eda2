//! Logs command - view and prune the run log

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use super::ensure_data_dir;
use crate::output::{self, format_size, format_timestamp};
use salesline_core::services::RunLogService;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent run events
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only failures
        #[arg(long)]
        errors: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete old run events
    Clear {
        /// Delete entries older than N days
        #[arg(long, default_value = "30")]
        older_than_days: u64,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show run log statistics and database path
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn get_run_log() -> Result<RunLogService> {
    let data_dir = ensure_data_dir()?;
    RunLogService::new(&data_dir, env!("CARGO_PKG_VERSION"))
}

/// First block of a run id, enough to tell runs apart in a table
fn short_run_id(run_id: &Option<String>) -> String {
    run_id
        .as_deref()
        .and_then(|id| id.split('-').next())
        .unwrap_or("")
        .to_string()
}

pub fn run(command: LogsCommands) -> Result<()> {
    let service = get_run_log()?;

    match command {
        LogsCommands::List { limit, errors, json } => {
            let entries = if errors {
                service.errors(limit)?
            } else {
                service.recent(limit)?
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }

            if entries.is_empty() {
                println!("No log entries found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Time", "Run", "Event", "Stage", "Error"]);
            for entry in &entries {
                let stage = entry
                    .stage
                    .as_deref()
                    .or(entry.command.as_deref())
                    .unwrap_or("");
                let error = match &entry.error_message {
                    Some(message) => message.red().to_string(),
                    None => String::new(),
                };
                table.add_row(vec![
                    format_timestamp(entry.timestamp),
                    short_run_id(&entry.run_id),
                    entry.event.clone(),
                    stage.to_string(),
                    error,
                ]);
            }
            println!("{}", table);
        }
        LogsCommands::Clear {
            older_than_days,
            force,
            json,
        } => {
            let cutoff_ms = chrono::Utc::now().timestamp_millis() - older_than_days as i64 * DAY_MS;

            if !force && !json {
                let confirmed = Confirm::new()
                    .with_prompt(format!("Delete run log entries older than {} days?", older_than_days))
                    .default(false)
                    .interact()?;
                if !confirmed {
                    println!("Cancelled.");
                    return Ok(());
                }
            }

            let deleted = service.delete_before(cutoff_ms)?;
            if json {
                println!("{}", serde_json::json!({ "deleted": deleted }));
            } else {
                println!("Deleted {} log entries", deleted);
            }
        }
        LogsCommands::Stats { json } => {
            let total = service.count()?;
            let failures = service.errors(1000)?.len();
            let db_path = service.db_path().to_path_buf();
            let size_bytes = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);

            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "total_entries": total,
                        "failure_count": failures,
                        "database_path": db_path.to_string_lossy(),
                        "database_size_bytes": size_bytes
                    })
                );
            } else {
                println!("{}", "Run Log Statistics".bold());
                println!("  Total entries: {}", total);
                println!("  Failures: {}", failures);
                println!("  Database: {}", db_path.display());
                println!("  Size: {}", format_size(size_bytes));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_run_id() {
        let id = Some("3f2b9c1e-0000-4000-8000-000000000000".to_string());
        assert_eq!(short_run_id(&id), "3f2b9c1e");
        assert_eq!(short_run_id(&None), "");
    }
}
