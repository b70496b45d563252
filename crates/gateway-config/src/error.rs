//! Error types for configuration handling.
//!
//! All errors implement `std::error::Error` via `thiserror`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while building the loader or loading policies.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required loader field was not set.
    #[error("{field} must be set")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// Reading a policy file failed.
    #[error("reading {}: {source}", path.display())]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },

    /// A policy file could not be parsed.
    #[error("parsing {}: {message}", path.display())]
    Parse {
        /// The offending file.
        path: PathBuf,
        /// Parser error message.
        message: String,
    },

    /// A policy parsed but violates a semantic constraint.
    #[error("invalid policy: {0}")]
    InvalidPolicy(String),
}

impl ConfigError {
    /// Creates a missing field error.
    pub fn missing(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    /// Creates an IO error for the given path.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a parse error for the given path.
    pub fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Returns true if the error prevents the loader from starting at all.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConfigError::MissingField { .. })
    }
}
