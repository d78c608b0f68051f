//! Centralized error types for mimecrypt.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mimecrypt library.
///
/// Structural mismatches during detection are not errors; they are reported
/// as `None` or an empty list by the detector.
#[derive(Error, Debug)]
pub enum MimeCryptError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("Message file not found: {0}")]
    FileNotFound(PathBuf),

    /// The message could not be turned into a part tree.
    #[error("MIME parsing error: {0}")]
    MimeError(String),

    /// A part body could not be written to a byte sink.
    #[error("Cannot read body of part: {0}")]
    BodyUnavailable(String),

    /// An IMAP server line could not be tokenized.
    #[error("IMAP parse error on line {line}: {reason}")]
    ImapParse { line: usize, reason: String },
}

/// Convenience alias for `Result<T, MimeCryptError>`.
pub type Result<T> = std::result::Result<T, MimeCryptError>;

impl MimeCryptError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an `ImapParse` variant for a 1-based line number.
    pub fn imap(line: usize, reason: impl Into<String>) -> Self {
        Self::ImapParse {
            line,
            reason: reason.into(),
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (in-memory sinks, mostly).
impl From<std::io::Error> for MimeCryptError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<memory>"),
            source,
        }
    }
}
