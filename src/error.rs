//! Error types for the robolog library.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for robolog operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when decoding or exporting logs.
///
/// Every decoder reports failure for the buffer as a whole: when an `Err` is
/// returned, no partially populated log is surfaced.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested log file does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The version byte/field is not in the accepted set
    #[error("Unsupported log version: {0}")]
    UnsupportedVersion(String),

    /// Not a log of the expected format (e.g., wrong magic bytes)
    #[error("Invalid log format: {0}")]
    InvalidFormat(String),

    /// Malformed structure (e.g., out-of-bounds read, bad length prefix)
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Export output error (e.g., Parquet write error)
    #[error("Output error: {0}")]
    OutputError(String),

    /// I/O error occurred while reading or writing
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Maps an internal decode failure to the single whole-buffer failure.
    pub(crate) fn parse(err: anyhow::Error) -> Self {
        Error::ParseError(format!("{:#}", err))
    }
}
