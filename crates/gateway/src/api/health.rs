use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

/// `GET /v1/health`: liveness of the service itself.
pub async fn health(State(state): State<AppState>) -> Response {
    match pb_catalog::blocking(&state.catalog, |c| c.count_devices()).await {
        Ok(devices) => Json(serde_json::json!({
            "status": "ok",
            "scheduler": state.scheduler.get(),
            "devices": devices,
        }))
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "degraded",
                "scheduler": state.scheduler.get(),
                "error": e.to_string(),
            })),
        )
            .into_response(),
    }
}
