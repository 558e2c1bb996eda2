//! Salesline Core - ingestion and ownership reattribution of sales extracts
//!
//! Layout follows a hexagonal architecture:
//!
//! - **domain**: raw rows, value normalizers and the canonical output records
//! - **ports**: traits for the table sink and progress reporting
//! - **services**: parsing, lookups, reattribution, the pipeline and publishing
//! - **adapters**: DuckDB and JSON-lines sinks

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use adapters::duckdb::DuckDbRepository;
use config::Config;
use services::{PipelineService, PublishService, StatusService};

pub use domain::result::{Error, OperationResult};
pub use domain::{
    Client, ExtractKind, OutputTable, PipelineEvent, PipelineOutput, ProgressEvent, RunStats,
    SaleRecord,
};
pub use services::InputBundle;

/// File name of the storage database inside the data directory
pub const DATABASE_FILE: &str = "salesline.duckdb";

/// Everything a command needs, built from one data directory
pub struct SaleslineContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub repository: Arc<DuckDbRepository>,
    pub pipeline_service: PipelineService,
    pub publish_service: PublishService,
    pub status_service: StatusService,
}

impl SaleslineContext {
    /// Load settings, open the storage database and wire the services
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;

        let repository = Arc::new(DuckDbRepository::new(&data_dir.join(DATABASE_FILE))?);
        repository.ensure_schema()?;

        let pipeline_service = PipelineService::from_config(&config);
        let publish_service = PublishService::new(repository.clone(), config.batch_size);
        let status_service = StatusService::new(Arc::clone(&repository));

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            repository,
            pipeline_service,
            publish_service,
            status_service,
        })
    }
}
