//! Error type for the reconciliation engine.
//!
//! Library crate errors convert in through `#[from]`; the binary wraps these
//! in `anyhow` at the edge.

use std::path::PathBuf;

/// Result type alias using the engine Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Engine error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Offset, delta or timestamp parsing failed.
    #[error(transparent)]
    Common(#[from] retimer_common::Error),

    /// AVCHD playlist failure.
    #[error(transparent)]
    Avchd(#[from] retimer_avchd::Error),

    /// Metadata tag failure.
    #[error(transparent)]
    Tags(#[from] retimer_tags::Error),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A file has no canonical timestamp to correct from.
    #[error("no timestamp resolved for {}", .0.display())]
    NoTimestamp(PathBuf),

    /// A path that is not part of the session.
    #[error("file not loaded: {}", .0.display())]
    UnknownFile(PathBuf),

    /// A file was written since it was last reloaded.
    #[error("file already written, reload it first: {}", .0.display())]
    Stale(PathBuf),
}

impl Error {
    /// Whether the failure concerns a single tag value rather than the file.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Tags(e) if e.is_parse())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::path::Path;

    #[test]
    fn test_error_display() {
        let err = Error::NoTimestamp(PathBuf::from("/a/b.jpg"));
        assert_eq!(err.to_string(), "no timestamp resolved for /a/b.jpg");

        let err = Error::from(retimer_common::Error::invalid_delta("soon"));
        assert_eq!(err.to_string(), "Invalid delta: soon");
    }

    #[test]
    fn test_error_from_crates() {
        let err = Error::from(retimer_avchd::Error::not_mpl("bad magic"));
        assert_matches!(err, Error::Avchd(ref e) if e.is_format());

        let err = Error::from(retimer_tags::Error::parse_error("Xmp.xmp.CreateDate", "x"));
        assert!(err.is_parse());

        let err = Error::from(retimer_tags::Error::unsupported(Path::new("a.txt")));
        assert!(!err.is_parse());
    }
}
