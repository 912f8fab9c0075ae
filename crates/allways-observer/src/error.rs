//! Error types for the observer HTTP surface.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use allways_core::CoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur in the observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was well-formed but violated a registry or routing rule.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An invalid path segment or query parameter was provided.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A UUID could not be parsed from the request path.
    #[error("invalid UUID: {0}")]
    InvalidUuid(String),

    /// The persistence service is unreachable or failed; retry later.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl From<CoreError> for ObserverError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { message } => Self::Validation(message),
            CoreError::NotFound { .. } => Self::NotFound(err.to_string()),
            CoreError::PersistenceUnavailable { source } => Self::Unavailable(source.to_string()),
        }
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Self::InvalidQuery(msg) | Self::InvalidUuid(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use allways_db::DbError;

    use super::*;

    fn status_of(err: ObserverError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn core_errors_map_to_http_statuses() {
        assert_eq!(
            status_of(CoreError::validation("gpio out of range").into()),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(CoreError::not_found("control box", "c1").into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(CoreError::from(DbError::Unavailable(String::from("down"))).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn malformed_input_is_a_bad_request() {
        assert_eq!(
            status_of(ObserverError::InvalidUuid(String::from("x"))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ObserverError::InvalidQuery(String::from("limit"))),
            StatusCode::BAD_REQUEST
        );
    }
}
