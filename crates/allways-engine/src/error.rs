//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup. [`InboundError`] covers a single field
//! message on the NATS bridge; it is reported back to the sender and never
//! stops the bridge.

use allways_core::{ConfigError, CoreError};
use allways_db::DbError;

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// The persistence backend could not be prepared.
    #[error("storage error: {source}")]
    Storage {
        /// The underlying store error.
        #[from]
        source: DbError,
    },

    /// NATS connection or messaging failed.
    #[error("NATS error: {message}")]
    Nats {
        /// Description of the NATS failure.
        message: String,
    },

    /// Observer API server failed to start.
    #[error("observer error: {message}")]
    Observer {
        /// Description of the observer failure.
        message: String,
    },
}

/// Failure handling one inbound field message.
#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    /// The payload was not the expected JSON shape.
    #[error("malformed payload: {source}")]
    Decode {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },

    /// The core rejected or failed the operation.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl InboundError {
    /// HTTP-style status code carried in error replies, so field devices
    /// can treat bridge and HTTP failures alike.
    pub const fn status(&self) -> u16 {
        match self {
            Self::Decode { .. } => 400,
            Self::Core(CoreError::Validation { .. }) => 422,
            Self::Core(CoreError::NotFound { .. }) => 404,
            Self::Core(CoreError::PersistenceUnavailable { .. }) => 503,
        }
    }
}
