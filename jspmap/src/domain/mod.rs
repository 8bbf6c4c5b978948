//! Domain model for jspmap
//!
//! This module contains core domain types and errors that provide:
//! - Names for the two files every lookup is about (template, compiled artifact)
//! - Structured error handling for each layer (extraction, resolution, config)

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{ArtifactId, NameMatch, TemplateFile};

pub use errors::{ConfigError, ExtractError, MappingError, ToolError};
