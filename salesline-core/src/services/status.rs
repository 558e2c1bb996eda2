//! Status service - what the storage currently holds

use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::OutputTable;

/// Status service for the output tables
pub struct StatusService {
    repository: Arc<DuckDbRepository>,
}

impl StatusService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Row count per table and last cache refresh
    pub fn get_status(&self) -> Result<StatusSummary> {
        let counts = self.repository.table_counts()?;
        let last_refresh = self.repository.last_refresh()?;

        Ok(StatusSummary {
            tables: OutputTable::ALL
                .into_iter()
                .map(|table| TableStatus {
                    table: table.table_name().to_string(),
                    rows: counts.get(table),
                })
                .collect(),
            total_rows: counts.history + counts.detailed + counts.clients,
            last_refresh: last_refresh.map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            database: self.repository.db_path().display().to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub tables: Vec<TableStatus>,
    pub total_rows: i64,
    /// UTC, `None` when the cache was never built
    pub last_refresh: Option<String>,
    pub database: String,
}

#[derive(Debug, Serialize)]
pub struct TableStatus {
    pub table: String,
    pub rows: i64,
}
