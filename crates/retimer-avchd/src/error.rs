//! Error types for retimer-avchd.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for retimer-avchd operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for retimer-avchd operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file is not an MPL playlist (wrong signature).
    #[error("Not an MPL playlist: {0}")]
    NotMpl(String),

    /// The playlist structure does not match the expected layout.
    #[error("Corrupt playlist at byte {offset}: {reason}")]
    Corruption { offset: u64, reason: String },

    /// The playlist changed size between decode and write.
    #[error("Playlist layout changed since it was read (length {expected} -> {actual})")]
    LayoutChanged { expected: u64, actual: u64 },

    /// A timestamp field cannot be represented in packed decimal.
    #[error("{field} value {value} cannot be stored in a playlist")]
    FieldOutOfRange { field: &'static str, value: i64 },

    /// The timezone sidecar is not valid JSON.
    #[error("Invalid timezone sidecar: {0}")]
    Sidecar(#[from] serde_json::Error),

    /// One or more playlists failed to write.
    #[error("{} playlist file(s) failed to write", .0.len())]
    Flush(Vec<FileError>),
}

impl Error {
    /// Create a corruption error.
    pub fn corruption(offset: u64, reason: impl Into<String>) -> Self {
        Self::Corruption {
            offset,
            reason: reason.into(),
        }
    }

    /// Create a wrong-signature error.
    pub fn not_mpl(msg: impl Into<String>) -> Self {
        Self::NotMpl(msg.into())
    }

    /// Whether this error only means "not a playlist" rather than a damaged one.
    pub fn is_format(&self) -> bool {
        matches!(self, Self::NotMpl(_))
    }

    /// Whether this error reports a damaged or changed playlist.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption { .. } | Self::LayoutChanged { .. })
    }
}

/// An error tied to the playlist file it happened in.
#[derive(Debug)]
pub struct FileError {
    /// The playlist path.
    pub path: PathBuf,
    /// What went wrong.
    pub error: Error,
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.error)
    }
}
