//! Progress and terminal events emitted during a run

use serde::{Deserialize, Serialize};

use super::output::PipelineOutput;
use super::result::Error;

/// A stage label with completion percentage (0-100)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub label: String,
    pub percentage: u8,
}

impl ProgressEvent {
    pub fn new(label: impl Into<String>, percentage: u8) -> Self {
        Self {
            label: label.into(),
            percentage: percentage.min(100),
        }
    }
}

/// Everything a run reports to its caller over a channel
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Progress(ProgressEvent),
    /// Terminal success, carrying the three collections
    Result(Box<PipelineOutput>),
    /// Terminal failure with a human-readable message and optional trace
    Error {
        kind: &'static str,
        message: String,
        trace: Option<String>,
    },
}

impl PipelineEvent {
    pub fn from_error(err: &Error) -> Self {
        PipelineEvent::Error {
            kind: err.kind(),
            message: err.to_string(),
            trace: err.diagnostic_trace(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PipelineEvent::Progress(_))
    }
}
