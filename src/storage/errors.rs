//! Error types for metric persistence

use thiserror::Error;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    /// Operation attempted before `connect()` or after `disconnect()`
    #[error("Storage is not connected")]
    NotConnected,

    #[error("Failed to connect to storage: {0}")]
    Connection(String),

    #[error("Storage query failed: {0}")]
    Query(String),

    /// A stored row could not be turned back into a record
    #[error("Corrupt record {id}: {message}")]
    CorruptRecord { id: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => Self::NotConnected,
            sqlx::Error::Io(e) => Self::Connection(e.to_string()),
            other => Self::Query(other.to_string()),
        }
    }
}
