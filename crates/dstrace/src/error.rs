//! Error types for dstrace
//!
//! Only the configuration edge can fail. Recording, merging and draining
//! are total and never produce a `TracerError`.

use thiserror::Error;

/// Result type alias for fallible dstrace operations
pub type TracerResult<T> = Result<T, TracerError>;

/// Error types for configuring the tracer
#[derive(Debug, Error)]
pub enum TracerError {
    /// Configuration value out of range or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration document could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

impl TracerError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this is a configuration validation error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this is a parse error
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }
}
