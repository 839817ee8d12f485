//! Common error types used throughout retimer.
//!
//! This module provides the error type for the small parsers shared by every
//! crate (UTC offsets, correction deltas, timestamps typed by a user).

/// Common error type for retimer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A UTC offset could not be parsed or is out of range.
    #[error("Invalid UTC offset: {0}")]
    InvalidOffset(String),

    /// A correction delta could not be parsed.
    #[error("Invalid delta: {0}")]
    InvalidDelta(String),

    /// A timestamp could not be parsed.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a new InvalidOffset error.
    pub fn invalid_offset<S: Into<String>>(msg: S) -> Self {
        Self::InvalidOffset(msg.into())
    }

    /// Create a new InvalidDelta error.
    pub fn invalid_delta<S: Into<String>>(msg: S) -> Self {
        Self::InvalidDelta(msg.into())
    }

    /// Create a new InvalidTimestamp error.
    pub fn invalid_timestamp<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTimestamp(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
