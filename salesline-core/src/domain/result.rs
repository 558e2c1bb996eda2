//! Result and error types for the core library

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
///
/// Only `Parse`, `Read` and `Transport` abort a pipeline run in normal
/// operation. Normalization failures and lookup misses never surface here.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Parse error in '{file}': {message}")]
    Parse { file: String, message: String },

    #[error("Read error on '{file}': {message}")]
    Read { file: String, message: String },

    #[error("Transport error on table '{table}': {message}")]
    Transport { table: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a parse error for the given file
    pub fn parse(file: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Parse {
            file: file.into(),
            message: msg.into(),
        }
    }

    /// Create a read error for the given file
    pub fn read(file: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Read {
            file: file.into(),
            message: msg.into(),
        }
    }

    /// Create a transport error for the given table
    pub fn transport(table: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Transport {
            table: table.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Coarse error class reported to callers
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Parse { .. } => "parse",
            Error::Read { .. } | Error::Io(_) => "read",
            Error::Transport { .. } | Error::Database(_) => "transport",
            Error::Validation(_) => "validation",
            Error::Config(_) => "config",
            Error::Json(_) | Error::Other(_) => "internal",
        }
    }

    /// Render the `source()` chain below this error, one cause per line
    pub fn diagnostic_trace(&self) -> Option<String> {
        let mut causes = Vec::new();
        let mut current = std::error::Error::source(self);
        while let Some(cause) = current {
            causes.push(format!("caused by: {}", cause));
            current = cause.source();
        }

        if causes.is_empty() {
            None
        } else {
            Some(causes.join("\n"))
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Operation result with optional context (for JSON output)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub context: Option<HashMap<String, serde_json::Value>>,
}

impl<T> OperationResult<T> {
    /// Create a successful result
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            context: None,
        }
    }

    /// Create a failed result
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: None,
        }
    }

    /// Create a failed result with context
    pub fn fail_with_context(
        error: impl Into<String>,
        context: HashMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            context: Some(context),
        }
    }
}

impl<T> From<Result<T>> for OperationResult<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => {
                let mut context = HashMap::new();
                context.insert("kind".to_string(), serde_json::json!(e.kind()));
                Self::fail_with_context(e.to_string(), context)
            }
        }
    }
}
