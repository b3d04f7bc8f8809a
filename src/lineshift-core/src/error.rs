//! Error types for buffer edits.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::buffer::BufferId;

/// Result type for edit operations.
pub type EditResult<T> = Result<T, EditError>;

/// Result type for buffer provider calls.
pub type BufferResult<T> = Result<T, BufferError>;

/// Errors that abort the batch an operation belongs to.
///
/// These describe a malformed request from the issuer (or a host buffer that
/// went away), so they are never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EditError {
    /// Neither the operation nor the session names a buffer.
    #[error("No target buffer given")]
    MissingHandle,

    /// The handle does not resolve to a live buffer.
    #[error("Buffer {buffer} is not open")]
    InvalidHandle { buffer: BufferId },

    /// A required line number is absent.
    #[error("Missing required coordinate `{field}`")]
    MissingCoordinate { field: &'static str },

    /// A line number is present but is not a non-negative integer.
    #[error("Coordinate `{field}` is not a line number: {value:?}")]
    InvalidCoordinate { field: &'static str, value: String },

    /// The corrected target line lies past the end of the buffer.
    #[error("Line {line} is past the end of buffer {buffer} ({line_count} lines)")]
    OutOfRange {
        buffer: BufferId,
        line: usize,
        line_count: usize,
    },

    /// The host buffer provider refused a call.
    #[error("Buffer error: {source}")]
    Buffer {
        #[from]
        source: BufferError,
    },
}

impl EditError {
    /// Create a missing coordinate error.
    pub fn missing_coordinate(field: &'static str) -> Self {
        Self::MissingCoordinate { field }
    }

    /// Create an invalid coordinate error.
    pub fn invalid_coordinate(field: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidCoordinate {
            field,
            value: value.into(),
        }
    }

    /// Check if the error is caused by the request rather than the host.
    pub fn is_request_error(&self) -> bool {
        !matches!(self, Self::Buffer { .. })
    }
}

/// Errors reported by a [`crate::BufferProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BufferError {
    /// The buffer is closed or was never opened.
    #[error("Buffer {buffer} is not open")]
    Closed { buffer: BufferId },

    /// A line range does not fit the buffer.
    #[error("Range {start}..{end} is outside buffer {buffer} ({line_count} lines)")]
    RangeOutOfBounds {
        buffer: BufferId,
        start: usize,
        end: usize,
        line_count: usize,
    },
}

/// Errors raised while saving a buffer.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Nothing tells us where the buffer lives.
    #[error("No path is associated with buffer {0}")]
    NoPath(BufferId),

    /// Reading the buffer back from the provider failed.
    #[error(transparent)]
    Buffer(#[from] BufferError),

    /// Failed to write the file.
    #[error("Failed to write file {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by search/replace edits.
#[derive(Debug, Error)]
pub enum SearchReplaceError {
    /// File not found.
    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Failed to read file.
    #[error("Failed to read file {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write file.
    #[error("Failed to write file {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The buffer provider refused a call.
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the config file.
    #[error("Failed to read config {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`crate::EditConfig`].
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// An environment override has an unknown value.
    #[error("Invalid value for {key}: {value}")]
    InvalidOverride { key: String, value: String },
}
