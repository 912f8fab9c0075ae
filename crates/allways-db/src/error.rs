//! Error types for the persistence layer.
//!
//! All errors are propagated via [`DbError`], which wraps the underlying
//! [`sqlx`] errors and adds the two conditions the core must tell apart:
//! a referential conflict (the caller's fault) and an unreachable store
//! (retryable).

/// Errors that can occur in the persistence layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[source] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A write would break a referential invariant.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store cannot be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be mapped back to a domain type.
    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for DbError {
    /// Classify driver errors: pool exhaustion and I/O failures mean the
    /// database is unreachable, foreign-key violations are conflicts.
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::Unavailable(err.to_string())
            }
            sqlx::Error::Database(ref db) if db.is_foreign_key_violation() => {
                Self::Conflict(db.message().to_owned())
            }
            other => Self::Postgres(other),
        }
    }
}

impl DbError {
    /// Whether the caller caused the failure (as opposed to the store).
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
