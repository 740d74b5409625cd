use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::presentation::state::AppState;

#[derive(Serialize)]
pub struct SweepResponse {
    pub removed: usize,
}

#[tracing::instrument(skip(state))]
pub async fn cache_sweep_handler(State(state): State<AppState>) -> impl IntoResponse {
    let removed = state.service.cache().sweep_expired().await;
    tracing::info!(removed, "Manual cache sweep finished");

    (StatusCode::OK, Json(SweepResponse { removed }))
}
