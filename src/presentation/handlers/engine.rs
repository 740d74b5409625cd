use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::application::services::EngineState;
use crate::presentation::state::AppState;

#[derive(Serialize)]
pub struct EngineStatusResponse {
    pub state: &'static str,
    pub device: Option<String>,
    pub idle_seconds: Option<f64>,
    pub idle_timeout_secs: u64,
}

#[derive(Serialize)]
pub struct UnloadResponse {
    pub unloaded: bool,
}

pub async fn engine_status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let status = state.service.lifecycle().status();

    let device = match status.state {
        EngineState::Loaded(device) => Some(device.to_string()),
        _ => None,
    };

    (
        StatusCode::OK,
        Json(EngineStatusResponse {
            state: status.state.as_str(),
            device,
            idle_seconds: status.idle_for.map(|d| d.as_secs_f64()),
            idle_timeout_secs: status.idle_timeout.as_secs(),
        }),
    )
}

#[tracing::instrument(skip(state))]
pub async fn engine_unload_handler(State(state): State<AppState>) -> impl IntoResponse {
    let unloaded = state.service.lifecycle().force_unload().await;
    tracing::info!(unloaded, "Engine unload requested");

    (StatusCode::OK, Json(UnloadResponse { unloaded }))
}
