//! Adapters - concrete `TableSink` implementations

pub mod duckdb;
pub mod jsonl;

pub use self::duckdb::{DuckDbRepository, TableCounts};
pub use self::jsonl::JsonLinesSink;
