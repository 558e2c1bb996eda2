//! Table sink port - the transport the output collections are published to

use async_trait::async_trait;

use crate::domain::result::Result;
use crate::domain::{Client, OutputTable, SaleRecord};

/// One chunk of rows bound for a single table
#[derive(Debug, Clone, Copy)]
pub enum RowBatch<'a> {
    Sales(&'a [SaleRecord]),
    Clients(&'a [Client]),
}

impl RowBatch<'_> {
    pub fn len(&self) -> usize {
        match self {
            RowBatch::Sales(rows) => rows.len(),
            RowBatch::Clients(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Storage that accepts whole-table replacement in batches
///
/// Implementations (adapters) provide the actual storage. Calls are awaited
/// one at a time; an error on any call aborts the publish.
#[async_trait]
pub trait TableSink: Send + Sync {
    /// Remove every row of the table
    async fn clear_table(&self, table: OutputTable) -> Result<()>;

    /// Append one batch of rows to the table
    async fn insert_batch(&self, table: OutputTable, batch: RowBatch<'_>) -> Result<()>;

    /// Rebuild derived caches once all tables have been accepted
    async fn refresh_cache(&self) -> Result<()>;
}
