//! Run log service - lifecycle events of pipeline runs, stored in logs.duckdb
//!
//! Only event names, stages, error messages and identifiers are stored.
//! Extract rows, client names and amounts never reach this database.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use duckdb::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::log_migrations::LOG_MIGRATIONS;
use crate::services::migration::MigrationService;

pub const RUN_STARTED: &str = "run_started";
pub const RUN_COMPLETED: &str = "run_completed";
pub const RUN_FAILED: &str = "run_failed";
pub const PUBLISH_COMPLETED: &str = "publish_completed";

/// Counter for unique IDs within the same millisecond
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Timestamp in the lower 48 bits, per-millisecond counter in the upper 16
fn generate_id() -> u64 {
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed) & 0xFFFF;
    ((now_ms() as u64) << 16) | counter
}

fn detect_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macos"
    } else if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "linux") {
        "linux"
    } else {
        "unknown"
    }
}

/// An event to be recorded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
}

impl LogEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            run_id: None,
            stage: None,
            command: None,
            error_message: None,
            error_details: None,
        }
    }

    pub fn with_run(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Stage of the run the event belongs to (e.g. "process", "publish")
    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_error_details(mut self, details: impl Into<String>) -> Self {
        self.error_details = Some(details.into());
        self
    }
}

/// A stored event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp: i64,
    pub app_version: String,
    pub platform: String,
    pub run_id: Option<String>,
    pub event: String,
    pub stage: Option<String>,
    pub command: Option<String>,
    pub error_message: Option<String>,
    pub error_details: Option<String>,
}

const SELECT_ENTRIES: &str = r#"
    SELECT id, timestamp, app_version, platform, run_id,
           event, stage, command, error_message, error_details
    FROM sys_run_log
"#;

fn entry_from_row(row: &duckdb::Row<'_>) -> duckdb::Result<LogEntry> {
    Ok(LogEntry {
        id: row.get(0)?,
        timestamp: row.get(1)?,
        app_version: row.get(2)?,
        platform: row.get(3)?,
        run_id: row.get(4)?,
        event: row.get(5)?,
        stage: row.get(6)?,
        command: row.get(7)?,
        error_message: row.get(8)?,
        error_details: row.get(9)?,
    })
}

/// Service for recording and querying run events
pub struct RunLogService {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    app_version: String,
    platform: &'static str,
}

impl RunLogService {
    /// Open or create logs.duckdb in the data directory
    pub fn new(data_dir: &Path, app_version: impl Into<String>) -> Result<Self> {
        let db_path = data_dir.join("logs.duckdb");
        let conn = Connection::open(&db_path)?;
        MigrationService::with_migrations(&conn, LOG_MIGRATIONS).run_pending()?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
            app_version: app_version.into(),
            platform: detect_platform(),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow!("Lock poisoned: {}", e))
    }

    /// Record an event; app version and platform are added here
    pub fn log(&self, event: LogEvent) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO sys_run_log (
                id, timestamp, app_version, platform, run_id,
                event, stage, command, error_message, error_details
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            duckdb::params![
                generate_id(),
                now_ms(),
                &self.app_version,
                self.platform,
                event.run_id.map(|id| id.to_string()),
                &event.event,
                &event.stage,
                &event.command,
                &event.error_message,
                &event.error_details,
            ],
        )?;
        Ok(())
    }

    /// Record a failure of `run_id` at `stage`
    pub fn log_failure(
        &self,
        run_id: Uuid,
        stage: &str,
        message: &str,
        details: Option<&str>,
    ) -> Result<()> {
        let mut event = LogEvent::new(RUN_FAILED)
            .with_run(run_id)
            .with_stage(stage)
            .with_error(message);
        if let Some(d) = details {
            event = event.with_error_details(d);
        }
        self.log(event)
    }

    /// Most recent entries first
    pub fn recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} ORDER BY timestamp DESC, id DESC LIMIT ?",
            SELECT_ENTRIES
        ))?;
        let entries = stmt
            .query_map([limit as i64], entry_from_row)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }

    /// Most recent entries that carry an error message
    pub fn errors(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE error_message IS NOT NULL ORDER BY timestamp DESC, id DESC LIMIT ?",
            SELECT_ENTRIES
        ))?;
        let entries = stmt
            .query_map([limit as i64], entry_from_row)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sys_run_log", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Delete entries older than `timestamp_ms` (unix ms)
    pub fn delete_before(&self, timestamp_ms: i64) -> Result<u64> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM sys_run_log WHERE timestamp < ?", [timestamp_ms])?;
        Ok(deleted as u64)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_service_creates_database() {
        let dir = tempdir().unwrap();
        let service = RunLogService::new(dir.path(), "0.1.0").unwrap();
        assert!(service.db_path().exists());
        assert_eq!(service.count().unwrap(), 0);
    }

    #[test]
    fn test_run_lifecycle_is_recorded() {
        let dir = tempdir().unwrap();
        let service = RunLogService::new(dir.path(), "0.1.0").unwrap();
        let run_id = Uuid::new_v4();

        service
            .log(LogEvent::new(RUN_STARTED).with_run(run_id).with_command("run"))
            .unwrap();
        service.log(LogEvent::new(RUN_COMPLETED).with_run(run_id)).unwrap();

        let entries = service.recent(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.run_id == Some(run_id.to_string())));
        assert!(entries.iter().any(|e| e.command.as_deref() == Some("run")));
        assert_eq!(entries[0].app_version, "0.1.0");
    }

    #[test]
    fn test_failures_are_listed_as_errors() {
        let dir = tempdir().unwrap();
        let service = RunLogService::new(dir.path(), "0.1.0").unwrap();
        let run_id = Uuid::new_v4();

        service.log(LogEvent::new(RUN_STARTED).with_run(run_id)).unwrap();
        service
            .log_failure(run_id, "publish", "Transport error on table 'data_history': refused", None)
            .unwrap();

        let errors = service.errors(10).unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].event, RUN_FAILED);
        assert_eq!(errors[0].stage.as_deref(), Some("publish"));
        assert_eq!(errors[0].error_details, None);
    }

    #[test]
    fn test_count_and_delete() {
        let dir = tempdir().unwrap();
        let service = RunLogService::new(dir.path(), "0.1.0").unwrap();

        for _ in 0..3 {
            service.log(LogEvent::new(RUN_STARTED)).unwrap();
        }
        assert_eq!(service.count().unwrap(), 3);

        let deleted = service.delete_before(now_ms() + 1000).unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(service.count().unwrap(), 0);
    }

    #[test]
    fn test_reopening_keeps_entries() {
        let dir = tempdir().unwrap();
        {
            let service = RunLogService::new(dir.path(), "0.1.0").unwrap();
            service.log(LogEvent::new(PUBLISH_COMPLETED)).unwrap();
        }
        let service = RunLogService::new(dir.path(), "0.1.0").unwrap();
        assert_eq!(service.count().unwrap(), 1);
    }
}
