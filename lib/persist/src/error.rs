//! Persistence errors.

use flowloom_core::DocumentId;
use std::fmt;

/// A save or load failure. Retryable; queued work is never dropped
/// because of one.
#[derive(Debug)]
pub enum PersistError {
    /// The requested document does not exist.
    NotFound { id: DocumentId },
    /// The stored bytes did not parse as a document.
    Corrupt { id: DocumentId, detail: String },
    /// Underlying I/O failed.
    Io(std::io::Error),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { id } => write!(f, "document {id} not found"),
            Self::Corrupt { id, detail } => {
                write!(f, "document {id} is corrupt: {detail}")
            }
            Self::Io(err) => write!(f, "storage i/o failed: {err}"),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PersistError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
