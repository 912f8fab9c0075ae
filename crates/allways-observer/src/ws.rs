//! `WebSocket` handler for the live status feed.
//!
//! Clients connect to `GET /ws/status` and receive one JSON text frame per
//! [`Delivery`]: `{"type":"event","event":{...}}` for each matching status
//! event, or `{"type":"resync","missed":N}` when the client fell behind the
//! channel and must re-read `/api/snapshot`.
//!
//! # Query parameters
//!
//! - `kinds` -- comma-separated event kinds (`semaphore_status`,
//!   `emergency_vehicle`, `pedestrian_request`, or `status`/`emergency`/
//!   `crossing`)
//! - `control_box` -- only events concerning this control box
//! - `semaphore_kind` -- `traffic` or `pedestrian`

use std::sync::Arc;

use allways_events::{Delivery, EventFilter};
use allways_types::{ControlBoxId, EventKind, SemaphoreKind};
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::error::ObserverError;
use crate::state::AppState;

/// Query parameters accepted by `GET /ws/status`.
#[derive(Debug, Default, serde::Deserialize)]
pub struct WsQuery {
    /// Comma-separated event kinds.
    pub kinds: Option<String>,
    /// Control box UUID.
    pub control_box: Option<String>,
    /// Semaphore kind.
    pub semaphore_kind: Option<String>,
}

/// Build an [`EventFilter`] from query parameters.
///
/// # Errors
///
/// Returns [`ObserverError::InvalidQuery`] for an unknown kind and
/// [`ObserverError::InvalidUuid`] for a malformed control box id.
pub fn parse_filter(query: &WsQuery) -> Result<EventFilter, ObserverError> {
    let mut filter = match query.kinds.as_deref().map(str::trim) {
        None | Some("") => EventFilter::all(),
        Some(raw) => {
            let kinds = raw
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(|k| {
                    EventKind::parse(k).ok_or_else(|| {
                        ObserverError::InvalidQuery(format!("unknown event kind {k:?}"))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            EventFilter::kinds(kinds)
        }
    };
    if let Some(raw) = query.control_box.as_deref() {
        let id: ControlBoxId = raw
            .trim()
            .parse()
            .map_err(|e| ObserverError::InvalidUuid(format!("{raw}: {e}")))?;
        filter = filter.with_control_box(id);
    }
    if let Some(raw) = query.semaphore_kind.as_deref() {
        let kind = SemaphoreKind::parse(raw).ok_or_else(|| {
            ObserverError::InvalidQuery(format!("unknown semaphore kind {raw:?}"))
        })?;
        filter = filter.with_semaphore_kind(kind);
    }
    Ok(filter)
}

/// Upgrade an HTTP request to a `WebSocket` connection and begin streaming
/// status deliveries.
///
/// # Route
///
/// `GET /ws/status`
pub async fn ws_status(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> Response {
    match parse_filter(&query) {
        Ok(filter) => ws.on_upgrade(move |socket| handle_ws(socket, state, filter)),
        Err(e) => e.into_response(),
    }
}

/// Forward every delivery for `filter` as a text frame until either side
/// closes.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>, filter: EventFilter) {
    debug!(?filter, "WebSocket client connected");

    let mut subscription = state.core.subscribe(filter);

    loop {
        tokio::select! {
            delivery = subscription.recv() => {
                let Some(delivery) = delivery else {
                    debug!("Status channel closed, shutting down WebSocket");
                    return;
                };
                if let Delivery::Resync { missed } = &delivery {
                    debug!(missed, "WebSocket client lagged, sending resync");
                }
                let json = match serde_json::to_string(&delivery) {
                    Ok(j) => j,
                    Err(e) => {
                        warn!("Failed to serialize status delivery: {e}");
                        continue;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    debug!("WebSocket client disconnected (send failed)");
                    return;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use allways_types::{LightStatus, SemaphoreId, StatusEvent, StatusOrigin};
    use chrono::Utc;

    use super::*;

    fn status_event(control_box_id: ControlBoxId, semaphore_kind: SemaphoreKind) -> StatusEvent {
        StatusEvent::SemaphoreStatusChanged {
            semaphore_id: SemaphoreId::new(),
            semaphore_kind,
            control_box_id,
            new_status: LightStatus::Green,
            previous_status: LightStatus::Red,
            origin: StatusOrigin::SelfReport,
            at: Utc::now(),
        }
    }

    #[test]
    fn empty_query_matches_everything() {
        let filter = parse_filter(&WsQuery::default()).unwrap();
        assert_eq!(filter, EventFilter::all());
    }

    #[test]
    fn filter_combines_parameters() {
        let cb = ControlBoxId::new();
        let query = WsQuery {
            kinds: Some(String::from("status, crossing")),
            control_box: Some(cb.to_string()),
            semaphore_kind: Some(String::from("traffic")),
        };
        let filter = parse_filter(&query).unwrap();
        assert!(filter.matches(&status_event(cb, SemaphoreKind::Traffic)));
        assert!(!filter.matches(&status_event(cb, SemaphoreKind::Pedestrian)));
        assert!(!filter.matches(&status_event(ControlBoxId::new(), SemaphoreKind::Traffic)));
    }

    #[test]
    fn bad_parameters_are_rejected() {
        let unknown_kind = WsQuery {
            kinds: Some(String::from("weather")),
            ..WsQuery::default()
        };
        assert!(matches!(
            parse_filter(&unknown_kind),
            Err(ObserverError::InvalidQuery(_))
        ));
        let bad_box = WsQuery {
            control_box: Some(String::from("not-a-uuid")),
            ..WsQuery::default()
        };
        assert!(matches!(
            parse_filter(&bad_box),
            Err(ObserverError::InvalidUuid(_))
        ));
    }

    #[test]
    fn delivery_frames_are_tagged() {
        let frame = serde_json::to_value(Delivery::Resync { missed: 4 }).unwrap();
        assert_eq!(frame["type"], "resync");
        assert_eq!(frame["missed"], 4);
    }
}
