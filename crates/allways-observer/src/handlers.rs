//! REST API endpoint handlers.
//!
//! Every handler delegates to [`AllwaysCore`](allways_core::AllwaysCore)
//! through the shared [`AppState`]; core errors map onto HTTP statuses via
//! [`ObserverError`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness and channel counters |
//! | `GET` | `/api/snapshot` | Registry snapshot plus recent logs |
//! | `GET`/`POST` | `/api/control-boxes` | List / upsert control boxes |
//! | `GET`/`DELETE` | `/api/control-boxes/{id}` | Get / delete a control box |
//! | `GET` | `/api/control-boxes/{id}/semaphores` | Semaphores of a control box |
//! | `POST` | `/api/semaphores/traffic` | Upsert a traffic semaphore |
//! | `POST` | `/api/semaphores/pedestrian` | Upsert a pedestrian semaphore |
//! | `GET`/`DELETE` | `/api/semaphores/{kind}/{id}` | Get / delete a semaphore |
//! | `GET` | `/api/destinations/{number}/semaphores` | Semaphores serving a destination |
//! | `PATCH` | `/api/status` | Status self-report |
//! | `GET`/`POST` | `/api/emergency` | Recent log / route a vehicle |
//! | `GET`/`POST` | `/api/crossings` | Recent log / button press |
//! | `POST` | `/api/crossings/tag` | Card-reader read |
//! | `POST` | `/api/pedestrians` | Upsert a registrant |
//! | `GET` | `/api/pedestrians/{cc_id}` | Get a registrant |

use std::sync::Arc;

use allways_types::{
    CivilId, ControlBoxDraft, ControlBoxId, CrossingSubmission, EmergencySubmission, Pedestrian,
    PedestrianSemaphoreDraft, SemaphoreId, SemaphoreKind, StatusUpdateCommand,
    TagCrossingSubmission, TrafficSemaphoreDraft,
};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::error::ObserverError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for recent-log reads.
#[derive(Debug, serde::Deserialize)]
pub struct LogQuery {
    /// Maximum number of rows (default from `monitor.recent_log_limit`).
    pub limit: Option<u32>,
}

// ---------------------------------------------------------------------------
// GET /health
// ---------------------------------------------------------------------------

/// Liveness check with status channel counters.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let channel = state.core.channel();
    Json(serde_json::json!({
        "status": "ok",
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "subscribers": channel.subscriber_count(),
        "eventsPublished": channel.events_published(),
    }))
}

// ---------------------------------------------------------------------------
// GET /api/snapshot
// ---------------------------------------------------------------------------

/// Full registry read plus the recent logs, for dashboards resyncing after
/// a missed event.
pub async fn snapshot(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let registry = state.core.registry().snapshot().await?;
    let emergency = state.core.recent_emergency_requests(None).await?;
    let crossings = state.core.recent_crossing_requests(None).await?;
    Ok(Json(serde_json::json!({
        "registry": registry,
        "recentEmergency": emergency,
        "recentCrossings": crossings,
    })))
}

// ---------------------------------------------------------------------------
// Control boxes
// ---------------------------------------------------------------------------

/// List all control boxes.
pub async fn list_control_boxes(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ObserverError> {
    let control_boxes = state.core.registry().list_control_boxes().await?;
    Ok(Json(serde_json::json!({
        "count": control_boxes.len(),
        "controlBoxes": control_boxes,
    })))
}

/// Register or edit a control box.
pub async fn upsert_control_box(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<ControlBoxDraft>,
) -> Result<impl IntoResponse, ObserverError> {
    let stored = state.core.registry().upsert_control_box(draft).await?;
    Ok(Json(stored))
}

/// Return a single control box.
pub async fn get_control_box(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id = ControlBoxId::from(parse_uuid(&id_str)?);
    let control_box = state.core.registry().get_control_box(id).await?;
    Ok(Json(control_box))
}

/// Delete a control box that owns no semaphores.
pub async fn delete_control_box(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id = ControlBoxId::from(parse_uuid(&id_str)?);
    state.core.registry().delete_control_box(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// A control box with all of its semaphores.
pub async fn list_semaphores_of(
    State(state): State<Arc<AppState>>,
    Path(id_str): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let id = ControlBoxId::from(parse_uuid(&id_str)?);
    let view = state.core.registry().list_semaphores_of(id).await?;
    Ok(Json(view))
}

// ---------------------------------------------------------------------------
// Semaphores
// ---------------------------------------------------------------------------

/// Register or edit a traffic semaphore.
pub async fn upsert_traffic(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<TrafficSemaphoreDraft>,
) -> Result<impl IntoResponse, ObserverError> {
    let stored = state.core.registry().upsert_traffic(draft).await?;
    Ok(Json(stored))
}

/// Register or edit a pedestrian semaphore.
pub async fn upsert_pedestrian_semaphore(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<PedestrianSemaphoreDraft>,
) -> Result<impl IntoResponse, ObserverError> {
    let stored = state
        .core
        .registry()
        .upsert_pedestrian_semaphore(draft)
        .await?;
    Ok(Json(stored))
}

/// Return a single semaphore of the given kind.
pub async fn get_semaphore(
    State(state): State<Arc<AppState>>,
    Path((kind_str, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, ObserverError> {
    let kind = parse_kind(&kind_str)?;
    let id = SemaphoreId::from(parse_uuid(&id_str)?);
    let semaphore = state.core.registry().get_semaphore(kind, id).await?;
    Ok(Json(semaphore))
}

/// Delete a semaphore of the given kind.
pub async fn delete_semaphore(
    State(state): State<Arc<AppState>>,
    Path((kind_str, id_str)): Path<(String, String)>,
) -> Result<impl IntoResponse, ObserverError> {
    let kind = parse_kind(&kind_str)?;
    let id = SemaphoreId::from(parse_uuid(&id_str)?);
    state.core.registry().delete_semaphore(kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Traffic semaphores serving a destination number.
pub async fn destination_semaphores(
    State(state): State<Arc<AppState>>,
    Path(destination): Path<i32>,
) -> Result<impl IntoResponse, ObserverError> {
    let semaphores = state.core.semaphores_serving(destination).await?;
    Ok(Json(serde_json::json!({
        "destination": destination,
        "count": semaphores.len(),
        "semaphores": semaphores,
    })))
}

// ---------------------------------------------------------------------------
// Status, emergency, crossings
// ---------------------------------------------------------------------------

/// Apply a controller status self-report.
pub async fn report_status(
    State(state): State<Arc<AppState>>,
    Json(command): Json<StatusUpdateCommand>,
) -> Result<impl IntoResponse, ObserverError> {
    let changes = state.core.report_status(command).await?;
    Ok(Json(serde_json::json!({
        "count": changes.len(),
        "changes": changes,
    })))
}

/// Route an emergency vehicle.
pub async fn submit_emergency(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<EmergencySubmission>,
) -> Result<impl IntoResponse, ObserverError> {
    let result = state.core.handle_emergency_request(submission).await?;
    Ok(Json(result))
}

/// Recent emergency requests, newest first.
pub async fn recent_emergency(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let requests = state.core.recent_emergency_requests(params.limit).await?;
    Ok(Json(serde_json::json!({
        "count": requests.len(),
        "requests": requests,
    })))
}

/// Log a pedestrian button press.
pub async fn submit_crossing(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<CrossingSubmission>,
) -> Result<impl IntoResponse, ObserverError> {
    let result = state.core.handle_crossing_request(submission).await?;
    Ok(Json(result))
}

/// Log a card-reader read.
pub async fn submit_tag_crossing(
    State(state): State<Arc<AppState>>,
    Json(submission): Json<TagCrossingSubmission>,
) -> Result<impl IntoResponse, ObserverError> {
    let result = state.core.handle_tag_crossing(submission).await?;
    Ok(Json(result))
}

/// Recent crossing requests, newest first.
pub async fn recent_crossings(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LogQuery>,
) -> Result<impl IntoResponse, ObserverError> {
    let requests = state.core.recent_crossing_requests(params.limit).await?;
    Ok(Json(serde_json::json!({
        "count": requests.len(),
        "requests": requests,
    })))
}

// ---------------------------------------------------------------------------
// Pedestrians
// ---------------------------------------------------------------------------

/// Register or edit a pedestrian.
pub async fn upsert_pedestrian(
    State(state): State<Arc<AppState>>,
    Json(record): Json<Pedestrian>,
) -> Result<impl IntoResponse, ObserverError> {
    let stored = state.core.registry().upsert_pedestrian(record).await?;
    Ok(Json(stored))
}

/// Return a single pedestrian by civil id.
pub async fn get_pedestrian(
    State(state): State<Arc<AppState>>,
    Path(cc_id): Path<String>,
) -> Result<impl IntoResponse, ObserverError> {
    let cc_id = CivilId::parse(&cc_id)
        .ok_or_else(|| ObserverError::InvalidQuery(String::from("civil id must not be blank")))?;
    let pedestrian = state.core.registry().get_pedestrian(&cc_id).await?;
    Ok(Json(pedestrian))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse a UUID from a string, returning an [`ObserverError`] on failure.
fn parse_uuid(s: &str) -> Result<Uuid, ObserverError> {
    s.parse::<Uuid>()
        .map_err(|e| ObserverError::InvalidUuid(format!("{s}: {e}")))
}

fn parse_kind(s: &str) -> Result<SemaphoreKind, ObserverError> {
    SemaphoreKind::parse(s)
        .ok_or_else(|| ObserverError::InvalidQuery(format!("unknown semaphore kind {s:?}")))
}
