//! Axum router wiring.

use axum::{
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", post(transport::intake))
        .route("/protocol", get(ops::protocol))
        .route("/v1/metrics", get(ops::metrics))
        .route("/live", get(ops::live))
        .with_state(state)
}
