use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::infrastructure::observability::request_id_middleware;
use crate::presentation::handlers::{
    cache_sweep_handler, engine_status_handler, engine_unload_handler, health_handler,
    transcribe_handler, transcribe_remote_handler,
};
use crate::presentation::middleware::require_api_token;
use crate::presentation::state::AppState;

const BYTES_PER_MB: usize = 1024 * 1024;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let upload_limit = state.settings.server.max_upload_mb.saturating_mul(BYTES_PER_MB);

    let api = Router::new()
        .route(
            "/v1/transcribe",
            post(transcribe_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/v1/transcribe/remote", post(transcribe_remote_handler))
        .route("/v1/engine", get(engine_status_handler))
        .route("/v1/engine/unload", post(engine_unload_handler))
        .route("/v1/cache/sweep", post(cache_sweep_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_token,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(cors)
        .with_state(state)
}
