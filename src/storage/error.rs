//! Error types for storage operations

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while persisting or loading records
///
/// A failed write never rolls back the in-memory state; the caller reports
/// it and carries on.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File access failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record could not be encoded or decoded
    #[error("record serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backend is not usable
    #[error("storage backend unhealthy: {0}")]
    UnhealthyBackend(String),
}

/// Persistence failure reported by an append
pub type PersistenceError = StorageError;

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}
