//! Error types for the core.
//!
//! [`CoreError`] is the taxonomy every inbound path reports in. Validation
//! failures are always raised before any mutation; persistence failures are
//! retryable and never retried here.

use allways_db::DbError;

/// Errors returned by registry, routing, crossing and status operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Malformed or missing input, or an invariant the input would break.
    #[error("validation failed: {message}")]
    Validation {
        /// What was wrong.
        message: String,
    },

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type (e.g. `"control box"`).
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },

    /// The persistence collaborator failed or could not be reached.
    #[error("persistence unavailable: {source}")]
    PersistenceUnavailable {
        /// The underlying store error.
        source: DbError,
    },
}

impl CoreError {
    /// Build a [`CoreError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Build a [`CoreError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<DbError> for CoreError {
    fn from(source: DbError) -> Self {
        if source.is_conflict() {
            Self::Validation {
                message: source.to_string(),
            }
        } else {
            Self::PersistenceUnavailable { source }
        }
    }
}
