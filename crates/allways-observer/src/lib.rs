//! HTTP and `WebSocket` surface for the AllWays traffic coordination core.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **`WebSocket` endpoint** (`/ws/status`) streaming filtered status
//!   channel deliveries, including explicit resync signals for clients
//!   that fall behind
//! - **Registry endpoints** for control boxes, semaphores, destinations
//!   and pedestrians
//! - **Field endpoints** for status self-reports, emergency dispatches and
//!   pedestrian crossing requests
//!
//! All state lives in [`AllwaysCore`](allways_core::AllwaysCore); the
//! observer is a thin translation layer from HTTP onto core operations.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use error::ObserverError;
pub use router::build_router;
pub use server::{ServerConfig, ServerError, spawn_observer, start_server};
pub use state::AppState;
