//! Service layer
//!
//! The pipeline stages are plain modules wired together by
//! `PipelineService`; publishing, status and the run log sit on top of the
//! adapters.

pub mod logging;
pub mod lookup;
pub mod migration;
pub mod parse;
mod pipeline;
pub mod postprocess;
pub mod projection;
mod publish;
pub mod reattribution;
mod status;

pub use logging::{LogEntry, LogEvent, RunLogService};
pub use migration::{MigrationResult, MigrationService};
pub use pipeline::{ExtractSet, InputBundle, PipelineService};
pub use publish::{
    BatchEmitter, Chunk, PublishService, PublishSummary, TablePublish,
};
pub use reattribution::{ReattributionEngine, Resolution, SyntheticCodeAllocator};
pub use status::{StatusService, StatusSummary, TableStatus};
