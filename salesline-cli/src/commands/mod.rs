//! CLI command implementations

pub mod logs;
pub mod run;
pub mod status;

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use salesline_core::services::{LogEvent, RunLogService};
use salesline_core::SaleslineContext;

/// Data directory from SALESLINE_DIR, else ~/.salesline
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("SALESLINE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".salesline"))
        .ok_or_else(|| anyhow!("Could not find home directory; set SALESLINE_DIR"))
}

/// Data directory, created if missing
pub fn ensure_data_dir() -> Result<PathBuf> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir)
}

/// Open the storage database and services
pub fn get_context() -> Result<SaleslineContext> {
    let data_dir = ensure_data_dir()?;
    SaleslineContext::new(&data_dir).context("Failed to initialize salesline context")
}

/// Run log for CLI operations
///
/// `None` when it cannot be opened; logging never blocks a command.
pub fn get_logger() -> Option<RunLogService> {
    let data_dir = ensure_data_dir().ok()?;
    match RunLogService::new(&data_dir, env!("CARGO_PKG_VERSION")) {
        Ok(service) => Some(service),
        Err(e) => {
            tracing::warn!(error = %e, "Run log unavailable");
            None
        }
    }
}

/// Record an event, ignoring failures
pub fn log_event(logger: &Option<RunLogService>, event: LogEvent) {
    if let Some(l) = logger {
        if let Err(e) = l.log(event) {
            tracing::warn!(error = %e, "Failed to write run log");
        }
    }
}
