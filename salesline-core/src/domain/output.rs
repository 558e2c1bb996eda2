//! Pipeline output: the three canonical collections and run statistics

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::client::Client;
use super::sale::SaleRecord;

/// Destination tables of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputTable {
    History,
    Detailed,
    Clients,
}

impl OutputTable {
    pub const ALL: [OutputTable; 3] = [
        OutputTable::History,
        OutputTable::Detailed,
        OutputTable::Clients,
    ];

    /// Storage table name
    pub fn table_name(&self) -> &'static str {
        match self {
            OutputTable::History => "data_history",
            OutputTable::Detailed => "data_detailed",
            OutputTable::Clients => "data_clients",
        }
    }

    /// Short label used in progress events
    pub fn label(&self) -> &'static str {
        match self {
            OutputTable::History => "history",
            OutputTable::Detailed => "detailed",
            OutputTable::Clients => "clients",
        }
    }
}

impl std::fmt::Display for OutputTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Counters collected while a run executes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Rows read per sales extract, before the supplier filter
    pub raw_rows: BTreeMap<String, usize>,
    /// Rows kept per sales extract after the supplier filter
    pub kept_rows: BTreeMap<String, usize>,
    pub clients: usize,
    pub products: usize,
    pub owners: usize,
    pub cities: usize,
    pub branch_supervisors: usize,
    /// How many rows each reattribution rule resolved
    pub rule_hits: BTreeMap<String, usize>,
    /// Rows whose branch was rewritten by the post-processors
    pub branch_overrides: usize,
    pub seller_branch_corrections: usize,
}

/// The three collections a run produces
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// Previous year followed by current-year history
    pub history: Vec<SaleRecord>,
    /// Current month
    pub detailed: Vec<SaleRecord>,
    pub clients: Vec<Client>,
    #[serde(skip)]
    pub stats: RunStats,
}

impl PipelineOutput {
    /// Row count of one collection
    pub fn len_of(&self, table: OutputTable) -> usize {
        match table {
            OutputTable::History => self.history.len(),
            OutputTable::Detailed => self.detailed.len(),
            OutputTable::Clients => self.clients.len(),
        }
    }

    /// SHA-256 over the canonical JSON of the three collections
    ///
    /// Identical inputs produce identical fingerprints.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for table in OutputTable::ALL {
            hasher.update(table.table_name().as_bytes());
            let payload = match table {
                OutputTable::History => serde_json::to_vec(&self.history),
                OutputTable::Detailed => serde_json::to_vec(&self.detailed),
                OutputTable::Clients => serde_json::to_vec(&self.clients),
            };
            // Vec of plain structs; serialization cannot fail
            hasher.update(payload.unwrap_or_default());
        }
        hex::encode(hasher.finalize())
    }
}
