//! Axum router construction for the observer API.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS middleware enabled for cross-origin dashboard access.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the observer server.
///
/// See [`handlers`] for the REST route table; the live feed is served at
/// `GET /ws/status`.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        // WebSocket
        .route("/ws/status", get(ws::ws_status))
        // Registry
        .route("/api/snapshot", get(handlers::snapshot))
        .route(
            "/api/control-boxes",
            get(handlers::list_control_boxes).post(handlers::upsert_control_box),
        )
        .route(
            "/api/control-boxes/{id}",
            get(handlers::get_control_box).delete(handlers::delete_control_box),
        )
        .route(
            "/api/control-boxes/{id}/semaphores",
            get(handlers::list_semaphores_of),
        )
        .route("/api/semaphores/traffic", post(handlers::upsert_traffic))
        .route(
            "/api/semaphores/pedestrian",
            post(handlers::upsert_pedestrian_semaphore),
        )
        .route(
            "/api/semaphores/{kind}/{id}",
            get(handlers::get_semaphore).delete(handlers::delete_semaphore),
        )
        .route(
            "/api/destinations/{number}/semaphores",
            get(handlers::destination_semaphores),
        )
        .route("/api/pedestrians", post(handlers::upsert_pedestrian))
        .route("/api/pedestrians/{cc_id}", get(handlers::get_pedestrian))
        // Field traffic
        .route("/api/status", patch(handlers::report_status))
        .route(
            "/api/emergency",
            get(handlers::recent_emergency).post(handlers::submit_emergency),
        )
        .route(
            "/api/crossings",
            get(handlers::recent_crossings).post(handlers::submit_crossing),
        )
        .route("/api/crossings/tag", post(handlers::submit_tag_crossing))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
