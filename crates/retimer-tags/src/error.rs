//! Error types for retimer-tags.

use std::path::PathBuf;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing metadata tags.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required external tool is not available.
    #[error("tool not found: {tool}")]
    ToolNotFound { tool: String },

    /// An external tool failed to execute.
    #[error("tool execution failed: {tool}: {message}")]
    ToolFailed { tool: String, message: String },

    /// A tag value could not be parsed.
    #[error("failed to parse {tag}: {message}")]
    ParseError { tag: String, message: String },

    /// A tag identifier outside the supported set.
    #[error("unknown tag: {0}")]
    UnknownTag(String),

    /// The metadata store cannot handle this file.
    #[error("unsupported file: {}", path.display())]
    Unsupported { path: PathBuf },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a tool not found error.
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    /// Create a tool execution failed error.
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a parse error.
    pub fn parse_error(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ParseError {
            tag: tag.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported file error.
    pub fn unsupported(path: impl Into<PathBuf>) -> Self {
        Self::Unsupported { path: path.into() }
    }

    /// Whether the error only concerns a single tag value.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::ParseError { .. })
    }
}
