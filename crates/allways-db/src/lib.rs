//! Persistence collaborator for the AllWays traffic coordination core.
//!
//! The core talks to storage only through the [`Store`] trait. Two
//! implementations ship with the crate:
//!
//! ```text
//! Store (trait)
//!     |
//!     +-- MemoryStore    (single RwLock, local runs and tests)
//!     |
//!     +-- PostgresStore  (sqlx PgPool, opened from PostgresOptions)
//!         |-- control_box, t_semaphore, p_semaphore, destination
//!         |-- pedestrian
//!         +-- emergency_vehicle, pedestrian_crossing (append-only)
//! ```
//!
//! # Modules
//!
//! - [`store`] -- The `Store` trait
//! - [`memory`] -- In-memory implementation
//! - [`postgres`] -- Opening the `PostgreSQL` store, fail-fast pool options
//! - [`pg_store`] -- `PostgreSQL` implementation and row types
//! - [`error`] -- Shared error types

pub mod error;
pub mod memory;
pub mod pg_store;
pub mod postgres;
pub mod store;

// Re-export primary types for convenience.
pub use error::DbError;
pub use memory::MemoryStore;
pub use pg_store::PostgresStore;
pub use postgres::PostgresOptions;
pub use store::Store;
