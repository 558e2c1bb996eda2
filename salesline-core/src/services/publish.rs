//! Publish service - replaces the storage tables with a run's output
//!
//! Tables are cleared and refilled one at a time, chunk by chunk. Each chunk
//! is awaited before the next one is prepared, so at most one chunk is in
//! flight.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::domain::result::{Error, Result};
use crate::domain::{OutputTable, PipelineOutput, ProgressEvent};
use crate::ports::{ProgressReporter, RowBatch, TableSink};

/// One fixed-size slice of a collection, with its position in the whole
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a, T> {
    pub rows: &'a [T],
    /// Rows emitted so far, this chunk included
    pub processed: usize,
    pub total: usize,
}

impl<T> Chunk<'_, T> {
    /// Share of the collection emitted once this chunk is sent
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.processed as f64 / self.total as f64) * 100.0).round() as u8
    }
}

/// Splits a collection into input-ordered chunks
pub struct BatchEmitter<'a, T> {
    rows: &'a [T],
    size: usize,
    offset: usize,
}

impl<'a, T> BatchEmitter<'a, T> {
    pub fn new(rows: &'a [T], size: usize) -> Self {
        Self {
            rows,
            size: size.max(1),
            offset: 0,
        }
    }
}

impl<'a, T> Iterator for BatchEmitter<'a, T> {
    type Item = Chunk<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.rows.len() {
            return None;
        }
        let end = (self.offset + self.size).min(self.rows.len());
        let rows = &self.rows[self.offset..end];
        self.offset = end;
        Some(Chunk {
            rows,
            processed: end,
            total: self.rows.len(),
        })
    }
}

/// What one table received
#[derive(Debug, Clone, Serialize)]
pub struct TablePublish {
    pub table: OutputTable,
    pub rows: usize,
    pub batches: usize,
}

/// Outcome of a publish
#[derive(Debug, Clone, Serialize)]
pub struct PublishSummary {
    pub tables: Vec<TablePublish>,
    /// Tables left untouched because their collection was empty
    pub skipped: Vec<OutputTable>,
    pub cache_refreshed: bool,
}

impl PublishSummary {
    pub fn total_rows(&self) -> usize {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

fn clearing_percentage(table: OutputTable) -> u8 {
    match table {
        OutputTable::History => 10,
        OutputTable::Detailed => 40,
        OutputTable::Clients => 70,
    }
}

/// Sink failures always surface as transport errors naming the table
fn as_transport(table: OutputTable, err: Error) -> Error {
    match err {
        Error::Transport { .. } => err,
        other => Error::transport(table.table_name(), other.to_string()),
    }
}

/// Pushes pipeline output into a `TableSink`
pub struct PublishService {
    sink: Arc<dyn TableSink>,
    batch_size: usize,
}

impl PublishService {
    pub fn new(sink: Arc<dyn TableSink>, batch_size: usize) -> Self {
        Self {
            sink,
            batch_size: batch_size.max(1),
        }
    }

    /// Clear and refill every non-empty table, then refresh the cache
    ///
    /// A clear or insert failure aborts immediately; tables already replaced
    /// stay replaced. A cache refresh failure is only logged.
    pub async fn publish(
        &self,
        output: &PipelineOutput,
        reporter: &dyn ProgressReporter,
    ) -> Result<PublishSummary> {
        let mut tables = Vec::new();
        let mut skipped = Vec::new();

        for table in OutputTable::ALL {
            let published = match table {
                OutputTable::History => {
                    self.publish_table(table, &output.history, RowBatch::Sales, reporter)
                        .await?
                }
                OutputTable::Detailed => {
                    self.publish_table(table, &output.detailed, RowBatch::Sales, reporter)
                        .await?
                }
                OutputTable::Clients => {
                    self.publish_table(table, &output.clients, RowBatch::Clients, reporter)
                        .await?
                }
            };
            match published {
                Some(summary) => tables.push(summary),
                None => skipped.push(table),
            }
        }

        reporter.report(ProgressEvent::new("Refreshing cache", 90));
        let cache_refreshed = match self.sink.refresh_cache().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Cache refresh failed; published data is intact");
                false
            }
        };

        let summary = PublishSummary {
            tables,
            skipped,
            cache_refreshed,
        };
        info!(
            rows = summary.total_rows(),
            tables = summary.tables.len(),
            cache_refreshed,
            "Publish complete"
        );
        Ok(summary)
    }

    async fn publish_table<'a, T>(
        &self,
        table: OutputTable,
        rows: &'a [T],
        wrap: fn(&'a [T]) -> RowBatch<'a>,
        reporter: &dyn ProgressReporter,
    ) -> Result<Option<TablePublish>> {
        if rows.is_empty() {
            debug!(%table, "Empty collection, table left untouched");
            return Ok(None);
        }

        reporter.report(ProgressEvent::new(
            format!("Clearing {}", table.label()),
            clearing_percentage(table),
        ));
        self.sink
            .clear_table(table)
            .await
            .map_err(|e| as_transport(table, e))?;

        let mut batches = 0;
        for chunk in BatchEmitter::new(rows, self.batch_size) {
            reporter.report(ProgressEvent::new(
                format!("Sending {}", table.label()),
                chunk.percentage(),
            ));
            self.sink
                .insert_batch(table, wrap(chunk.rows))
                .await
                .map_err(|e| as_transport(table, e))?;
            batches += 1;
            debug!(%table, processed = chunk.processed, total = chunk.total, "Chunk sent");
        }

        Ok(Some(TablePublish {
            table,
            rows: rows.len(),
            batches,
        }))
    }
}
