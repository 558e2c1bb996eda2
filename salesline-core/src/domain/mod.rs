//! Core domain entities
//!
//! Raw rows, normalized values and the canonical output records. These are
//! pure data structures and functions - no I/O.

mod client;
mod event;
pub mod extract;
mod output;
pub mod result;
pub mod row;
mod sale;
pub mod value;

pub use client::Client;
pub use event::{PipelineEvent, ProgressEvent};
pub use extract::ExtractKind;
pub use output::{OutputTable, PipelineOutput, RunStats};
pub use row::{RawRow, RawValue};
pub use sale::{Owner, SaleRecord};
