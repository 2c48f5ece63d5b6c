//! Error type shared by every formula variant.

use thiserror::Error;

/// Failures raised by formula construction and evaluation.
///
/// Both variants are local precondition violations: they are reported
/// immediately at the call that caused them and never leave partial state.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FormulaError {
    /// A level or XP argument outside the formula's domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed formula parameters (non-positive base, bad expression, ...).
    #[error("invalid formula configuration: {0}")]
    Configuration(String),
}

impl FormulaError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, FormulaError>;
