//! `POST /v1/points/read`: live values of catalogued points.

use axum::extract::{Json, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use crate::api::{api_error, error_response};
use crate::runtime::point_read;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReadRequest {
    pub device_no: u32,
    pub point_names: Vec<String>,
}

pub async fn read(State(state): State<AppState>, Json(body): Json<ReadRequest>) -> Response {
    if body.point_names.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "point_names must not be empty");
    }

    match point_read::read_points(
        &state.catalog,
        state.client.as_ref(),
        state.timeouts,
        body.device_no,
        &body.point_names,
    )
    .await
    {
        Ok(data) => Json(serde_json::json!({
            "device_no": body.device_no,
            "data": data,
        }))
        .into_response(),
        Err(e) => error_response(&e),
    }
}
