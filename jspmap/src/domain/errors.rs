//! Structured error types for jspmap
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Extraction errors are never fatal: every variant of [`ExtractError`] only
//! tells the chain to try the next tier.

use std::time::Duration;
use thiserror::Error;

/// Why one extraction tier produced no table
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no mapping data: {0}")]
    NotFound(String),

    /// Start token present but the data is truncated or corrupted
    #[error("malformed mapping data: {0}")]
    Malformed(String),

    #[error("external tool unavailable: {0}")]
    ToolUnavailable(String),
}

/// Failures of the external disassembly tool
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("no tool command configured")]
    NoCommand,

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}")]
    Exited { program: String, status: String },

    #[error("{program} timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("{program} was cancelled")]
    Cancelled { program: String },

    #[error("{program} produced more than {limit} bytes of output")]
    OutputTooLarge { program: String, limit: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Short label for log lines
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::NotFound(_) => "not found",
            ExtractError::Malformed(_) => "malformed",
            ExtractError::ToolUnavailable(_) => "tool unavailable",
        }
    }
}

impl From<ToolError> for ExtractError {
    /// An unconfigured tool is plain absence, not a failure
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NoCommand => ExtractError::NotFound(err.to_string()),
            _ => ExtractError::ToolUnavailable(err.to_string()),
        }
    }
}

/// Top-level outcomes of table construction and line queries
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// Every extraction tier came back empty
    #[error("no line mapping available for {artifact}")]
    NotFound { artifact: String },

    #[error("mapping table is empty")]
    EmptyTable,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
