//! Integration tests for the observer API endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server, backed by the in-memory store.

#![allow(clippy::unwrap_used, clippy::too_many_lines)]

use std::sync::Arc;

use allways_core::AllwaysCore;
use allways_db::{MemoryStore, Store};
use allways_events::StatusChannel;
use allways_observer::router::build_router;
use allways_observer::state::AppState;
use allways_types::{ControlBoxId, SemaphoreId, TmcId};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

struct Fixture {
    router: Router,
    store: Arc<MemoryStore>,
    control_box: ControlBoxId,
    traffic: SemaphoreId,
    pedestrian: SemaphoreId,
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let core = AllwaysCore::new(Arc::clone(&store) as Arc<dyn Store>, StatusChannel::new());
    let router = build_router(Arc::new(AppState::new(core)));

    let control_box = send(
        &router,
        "POST",
        "/api/control-boxes",
        Some(json!({
            "name": "CB-Central",
            "location": "Avenida",
            "tmcId": TmcId::new(),
            "networkUsername": "cb-central",
            "networkSecret": "hunter2",
        })),
    )
    .await;
    assert_eq!(control_box.0, StatusCode::OK);
    let control_box: ControlBoxId = serde_json::from_value(control_box.1["id"].clone()).unwrap();

    let traffic = send(
        &router,
        "POST",
        "/api/semaphores/traffic",
        Some(json!({
            "controlBoxId": control_box,
            "name": "TS1",
            "location": 1,
            "gpioRed": 17,
            "gpioYellow": 27,
            "gpioGreen": 22,
            "destinations": [7, 8],
        })),
    )
    .await;
    assert_eq!(traffic.0, StatusCode::OK);
    let traffic: SemaphoreId = serde_json::from_value(traffic.1["id"].clone()).unwrap();

    let pedestrian = send(
        &router,
        "POST",
        "/api/semaphores/pedestrian",
        Some(json!({
            "controlBoxId": control_box,
            "name": "PS1",
            "location": 2,
            "gpioRed": 5,
            "gpioGreen": 6,
            "hasCardReader": true,
            "hasButton": false,
            "gpioButton": 13,
            "buttonThreshold": 4,
        })),
    )
    .await;
    assert_eq!(pedestrian.0, StatusCode::OK);
    assert_eq!(pedestrian.1["gpioButton"], Value::Null);
    assert_eq!(pedestrian.1["buttonThreshold"], Value::Null);
    let pedestrian: SemaphoreId = serde_json::from_value(pedestrian.1["id"].clone()).unwrap();

    Fixture {
        router,
        store,
        control_box,
        traffic,
        pedestrian,
    }
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

// =========================================================================
// Health and snapshot
// =========================================================================

#[tokio::test]
async fn test_health() {
    let f = fixture().await;
    let (status, json) = send(&f.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["subscribers"], 0);
}

#[tokio::test]
async fn test_snapshot_lists_registry_and_logs() {
    let f = fixture().await;
    let (status, json) = send(&f.router, "GET", "/api/snapshot", None).await;
    assert_eq!(status, StatusCode::OK);
    let boxes = json["registry"]["controlBoxes"].as_array().unwrap();
    assert_eq!(boxes.len(), 1);
    assert_eq!(boxes[0]["traffic"][0]["status"], "UNKNOWN");
    assert_eq!(boxes[0]["controlBox"].get("networkSecret"), None);
    assert_eq!(json["recentEmergency"], json!([]));
}

// =========================================================================
// Registry
// =========================================================================

#[tokio::test]
async fn test_control_box_routes() {
    let f = fixture().await;

    let (status, json) = send(&f.router, "GET", "/api/control-boxes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);

    let uri = format!("/api/control-boxes/{}", f.control_box);
    let (status, json) = send(&f.router, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "CB-Central");

    let (status, json) = send(&f.router, "GET", &format!("{uri}/semaphores"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["traffic"].as_array().unwrap().len(), 1);
    assert_eq!(json["pedestrian"].as_array().unwrap().len(), 1);

    let (status, json) = send(&f.router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["status"], 422);
}

#[tokio::test]
async fn test_unknown_control_box_is_404() {
    let f = fixture().await;
    let uri = format!("/api/control-boxes/{}", ControlBoxId::new());
    let (status, json) = send(&f.router, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_invalid_uuid_is_400() {
    let f = fixture().await;
    let (status, _) = send(&f.router, "GET", "/api/control-boxes/not-a-uuid", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(&f.router, "GET", "/api/semaphores/bridge/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_gpio_collision_is_422() {
    let f = fixture().await;
    let (status, json) = send(
        &f.router,
        "POST",
        "/api/semaphores/traffic",
        Some(json!({
            "controlBoxId": f.control_box,
            "name": "TS2",
            "location": 3,
            "gpioRed": 4,
            "gpioYellow": 4,
            "gpioGreen": 99,
            "destinations": [9],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(json["error"].as_str().unwrap().contains("gpio"));

    let (_, json) = send(&f.router, "GET", "/api/destinations/9/semaphores", None).await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_semaphore_get_delete_and_destinations() {
    let f = fixture().await;

    let (status, json) = send(&f.router, "GET", "/api/destinations/7/semaphores", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
    assert_eq!(json["semaphores"][0]["id"], f.traffic.to_string());

    let uri = format!("/api/semaphores/traffic/{}", f.traffic);
    let (status, json) = send(&f.router, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["kind"], "traffic");

    let (status, _) = send(&f.router, "DELETE", &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&f.router, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, json) = send(&f.router, "GET", "/api/destinations/7/semaphores", None).await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn test_pedestrian_routes() {
    let f = fixture().await;
    let (status, json) = send(
        &f.router,
        "POST",
        "/api/pedestrians",
        Some(json!({"ccId": "30111222", "name": "Rui", "physicalTagId": "04:11", "disability": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ccId"], "30111222");

    let (status, json) = send(&f.router, "GET", "/api/pedestrians/30111222", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["name"], "Rui");

    let (status, _) = send(&f.router, "GET", "/api/pedestrians/404", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// =========================================================================
// Field traffic
// =========================================================================

#[tokio::test]
async fn test_emergency_dispatch_turns_route_green() {
    let f = fixture().await;
    let (status, json) = send(
        &f.router,
        "POST",
        "/api/emergency",
        Some(json!({
            "tmcid": TmcId::new(),
            "controlbox_id": f.control_box,
            "licenseplate": "AB-12-CD",
            "origin": 1,
            "destination": 7,
            "priority_level": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["affected"], json!([f.traffic.to_string()]));
    assert_eq!(json["outcomes"][0]["outcome"], "changed");
    assert_eq!(json["request"]["priorityLevel"], 1);

    let uri = format!("/api/semaphores/traffic/{}", f.traffic);
    let (_, json) = send(&f.router, "GET", &uri, None).await;
    assert_eq!(json["status"], "GREEN");

    let (status, json) = send(&f.router, "GET", "/api/emergency?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
}

#[tokio::test]
async fn test_emergency_with_bad_priority_is_422() {
    let f = fixture().await;
    let (status, _) = send(
        &f.router,
        "POST",
        "/api/emergency",
        Some(json!({
            "tmcId": TmcId::new(),
            "controlBoxId": f.control_box,
            "licensePlate": "AB-12-CD",
            "origin": 1,
            "destination": 7,
            "priorityLevel": 9,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_status_patch() {
    let f = fixture().await;
    let (status, json) = send(
        &f.router,
        "PATCH",
        "/api/status",
        Some(json!({
            "table": "t_semaphore",
            "identifierField": "location",
            "identifierValue": 1,
            "updateValue": 0,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 1);
    assert_eq!(json["changes"][0]["current"], "RED");

    let (status, _) = send(
        &f.router,
        "PATCH",
        "/api/status",
        Some(json!({
            "entityKind": "traffic",
            "identifierValue": f.traffic.to_string(),
            "newStatus": 5,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let uri = format!("/api/semaphores/traffic/{}", f.traffic);
    let (_, json) = send(&f.router, "GET", &uri, None).await;
    assert_eq!(json["status"], "RED");
}

#[tokio::test]
async fn test_crossing_routes() {
    let f = fixture().await;
    let (status, json) = send(
        &f.router,
        "POST",
        "/api/crossings",
        Some(json!({"psem_id": f.pedestrian, "pedestrianCC_id": "unknown-person"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["attributed"], false);
    assert_eq!(json["request"]["pedestrianId"], Value::Null);

    let (status, json) = send(
        &f.router,
        "POST",
        "/api/crossings/tag",
        Some(json!({"semaphoreId": f.pedestrian, "physicalTag": "FF:00"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["attributed"], false);

    let (status, json) = send(&f.router, "GET", "/api/crossings", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);

    let (status, _) = send(
        &f.router,
        "POST",
        "/api/crossings",
        Some(json!({"semaphoreId": f.traffic})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_store_outage_is_503() {
    let f = fixture().await;
    f.store.set_offline(true);
    let (status, json) = send(&f.router, "GET", "/api/control-boxes", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["status"], 503);
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let f = fixture().await;
    let (status, _) = send(
        &f.router,
        "POST",
        "/api/semaphores/traffic",
        Some(json!({"name": "missing everything"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
