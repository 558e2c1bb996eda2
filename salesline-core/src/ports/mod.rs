//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The pipeline
//! depends only on these traits, not on concrete implementations.

mod progress;
mod sink;

pub use progress::{ChannelReporter, NoopReporter, ProgressReporter};
pub use sink::{RowBatch, TableSink};
