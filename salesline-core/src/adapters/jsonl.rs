//! JSON-lines adapter - writes each output table to `<table>.jsonl`

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::domain::result::{Error, Result};
use crate::domain::OutputTable;
use crate::ports::{RowBatch, TableSink};

/// Sink writing one JSON object per line, using the storage column names
pub struct JsonLinesSink {
    dir: PathBuf,
}

impl JsonLinesSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, table: OutputTable) -> PathBuf {
        self.dir.join(format!("{}.jsonl", table.table_name()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn encode<T: Serialize>(rows: &[T], buf: &mut Vec<u8>) -> serde_json::Result<()> {
    for row in rows {
        serde_json::to_writer(&mut *buf, row)?;
        buf.push(b'\n');
    }
    Ok(())
}

#[async_trait]
impl TableSink for JsonLinesSink {
    async fn clear_table(&self, table: OutputTable) -> Result<()> {
        let io = |e: std::io::Error| Error::transport(table.table_name(), e.to_string());
        fs::create_dir_all(&self.dir).await.map_err(io)?;
        fs::write(self.path_for(table), b"").await.map_err(io)?;
        Ok(())
    }

    async fn insert_batch(&self, table: OutputTable, batch: RowBatch<'_>) -> Result<()> {
        let mut buf = Vec::new();
        let encoded = match batch {
            RowBatch::Sales(rows) => encode(rows, &mut buf),
            RowBatch::Clients(rows) => encode(rows, &mut buf),
        };
        encoded.map_err(|e| Error::transport(table.table_name(), e.to_string()))?;

        let io = |e: std::io::Error| Error::transport(table.table_name(), e.to_string());
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path_for(table))
            .await
            .map_err(io)?;
        file.write_all(&buf).await.map_err(io)?;
        file.flush().await.map_err(io)?;
        Ok(())
    }

    /// Nothing is derived from plain files
    async fn refresh_cache(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Client;
    use tempfile::TempDir;

    fn client(code: &str) -> Client {
        Client {
            code: code.to_string(),
            route_rep_1: "10".into(),
            route_rep_2: String::new(),
            city: "N/A".into(),
            display_name: "N/A".into(),
            neighborhood: "N/A".into(),
            legal_name: "N/A".into(),
            fantasy_name: "N/A".into(),
            category: "N/A".into(),
            last_purchase: None,
            block_status: String::new(),
        }
    }

    #[tokio::test]
    async fn test_clear_then_append() {
        let dir = TempDir::new().unwrap();
        let sink = JsonLinesSink::new(dir.path().join("out"));
        let rows = vec![client("1"), client("2")];

        sink.clear_table(OutputTable::Clients).await.unwrap();
        sink.insert_batch(OutputTable::Clients, RowBatch::Clients(&rows)).await.unwrap();
        sink.insert_batch(OutputTable::Clients, RowBatch::Clients(&rows[..1])).await.unwrap();

        let text = std::fs::read_to_string(sink.path_for(OutputTable::Clients)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["codigo_cliente"], "1");

        sink.clear_table(OutputTable::Clients).await.unwrap();
        let text = std::fs::read_to_string(sink.path_for(OutputTable::Clients)).unwrap();
        assert!(text.is_empty());
    }
}
