//! Operational HTTP endpoints.
//!
//! - `/live`       : liveness
//! - `/protocol`   : configured wire protocol id
//! - `/v1/metrics` : Prometheus text format (model metrics, then relay metrics)

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::app_state::AppState;
use crate::transport::HttpError;

pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, "Alive")
}

pub async fn protocol(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, state.protocol().as_str())
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let (mut body, content_type) = match state.metrics().exposition().await {
        Ok(v) => v,
        Err(e) => return HttpError(e).into_response(),
    };
    body.push_str(&state.stats().render());

    (StatusCode::OK, [(header::CONTENT_TYPE, content_type)], body).into_response()
}
