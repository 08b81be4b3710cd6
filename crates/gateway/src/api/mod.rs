pub mod devices;
pub mod health;
pub mod points;

use axum::extract::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;

use pb_domain::Error;

use crate::state::AppState;

/// Build the full API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/health", get(health::health))
        // Devices
        .route("/v1/devices/register", post(devices::register))
        .route("/v1/devices/status", get(devices::list_status))
        .route(
            "/v1/devices/:device_no",
            get(devices::get_device).delete(devices::remove_device),
        )
        .route("/v1/devices/:device_no/points", get(devices::list_points))
        // Points
        .route("/v1/points/read", post(points::read))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build a standardized JSON error response: `{ "error": "<message>" }`.
pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// Map a domain error to its HTTP status.
pub(crate) fn error_response(err: &Error) -> Response {
    let status = match err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Connection(_) | Error::Protocol(_) => StatusCode::BAD_GATEWAY,
        Error::Storage(_) | Error::Io(_) | Error::Json(_) | Error::Config(_) | Error::Other(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() && status != StatusCode::BAD_GATEWAY {
        tracing::error!(error = %err, "request failed");
    }
    api_error(status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_map_to_distinct_statuses() {
        let cases = [
            (Error::NotFound("device 3".into()), StatusCode::NOT_FOUND),
            (Error::Connection("refused".into()), StatusCode::BAD_GATEWAY),
            (Error::Storage("locked".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(error_response(&err).status(), expected);
        }
    }
}
