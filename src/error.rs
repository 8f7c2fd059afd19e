//! Centralized error types for inboxrules.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the inboxrules library.
///
/// The rule engine itself never surfaces these from `process`; they come
/// from the collaborators (rule source, record store, mailbox, ingestion).
#[derive(Error, Debug)]
pub enum InboxError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The rule document could not be decoded into rules.
    #[error("Invalid rule document '{origin}': {reason}")]
    RuleDocument { origin: String, reason: String },

    /// The record store file is corrupt or was written by an incompatible version.
    #[error("Corrupt or incompatible record store '{path}': {reason}")]
    InvalidStore { path: PathBuf, reason: String },

    /// The local mailbox state file could not be decoded.
    #[error("Invalid mailbox state '{path}': {reason}")]
    MailboxState { path: PathBuf, reason: String },

    /// Encoding a value for persistence failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for `Result<T, InboxError>`.
pub type Result<T> = std::result::Result<T, InboxError>;

impl InboxError {
    /// Create an `Io` variant from a path and an `io::Error`.
    ///
    /// `NotFound` is mapped to [`InboxError::FileNotFound`] so callers can
    /// tell a missing file apart from an unreadable one.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::FileNotFound(path)
        } else {
            Self::Io { path, source }
        }
    }
}
