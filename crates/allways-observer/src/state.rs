//! Shared application state for the observer server.

use std::time::Instant;

use allways_core::AllwaysCore;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor. All reads and writes go through the core; the observer keeps
/// no copy of registry state.
#[derive(Clone)]
pub struct AppState {
    /// The assembled core.
    pub core: AllwaysCore,
    /// When the server state was created.
    pub started_at: Instant,
}

impl AppState {
    /// Create application state around a core handle.
    pub fn new(core: AllwaysCore) -> Self {
        Self {
            core,
            started_at: Instant::now(),
        }
    }
}
