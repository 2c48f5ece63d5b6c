//! Unified error type surfaced by the leveling runtime.
//!
//! Wraps formula and repository failures so callers can tell local
//! precondition violations apart from storage trouble.
use leveling_core::FormulaError;
use thiserror::Error;

pub use crate::repository::RepositoryError;

pub type Result<T> = std::result::Result<T, LevelingError>;

#[derive(Debug, Error)]
pub enum LevelingError {
    /// Bad level, XP or amount input. Nothing was changed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed formula parameters or an unusable recorded formula.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Storage failed while performing `operation`.
    ///
    /// For service mutations the cached record may already hold the new
    /// value; see [`LevelService::invalidate`](crate::LevelService::invalidate).
    #[error("persistence failure during {operation}")]
    Persistence {
        operation: String,
        #[source]
        source: RepositoryError,
    },

    #[error("level service lock was poisoned")]
    LockPoisoned,
}

impl LevelingError {
    pub(crate) fn persistence(operation: impl Into<String>, source: RepositoryError) -> Self {
        Self::Persistence {
            operation: operation.into(),
            source,
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl From<FormulaError> for LevelingError {
    fn from(error: FormulaError) -> Self {
        match error {
            FormulaError::InvalidArgument(message) => Self::InvalidArgument(message),
            FormulaError::Configuration(message) => Self::Configuration(message),
        }
    }
}
