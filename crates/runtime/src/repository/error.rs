//! Error types raised by repository implementations.

use thiserror::Error;

/// Errors surfaced by repository implementations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("progression repository lock was poisoned")]
    LockPoisoned,

    #[error("progression repository is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("corrupted data: {0}")]
    CorruptedData(String),

    #[error("metadata {field} for '{key}' is {len} chars, limit is {limit}")]
    MetadataTooLong {
        key: String,
        field: &'static str,
        len: usize,
        limit: usize,
    },

    #[error("xp rewrite aborted at entity {entity}: {reason}")]
    RewriteAborted { entity: String, reason: String },
}

pub type Result<T> = std::result::Result<T, RepositoryError>;
