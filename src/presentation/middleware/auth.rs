use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;

use crate::presentation::handlers::error_response;
use crate::presentation::state::AppState;

const BEARER_PREFIX: &str = "Bearer ";

/// Rejects requests without the configured bearer token. A no-op when no
/// token is configured.
pub async fn require_api_token(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.api_token() else {
        return next.run(request).await;
    };

    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .map(str::trim);

    match presented {
        Some(token) if token == expected => next.run(request).await,
        Some(_) => {
            tracing::warn!(uri = %request.uri().path(), "Rejected request with invalid API token");
            unauthorized(&state)
        }
        None => {
            tracing::warn!(uri = %request.uri().path(), "Rejected request without API token");
            unauthorized(&state)
        }
    }
}

fn unauthorized(state: &AppState) -> Response {
    let mut response = error_response(
        StatusCode::UNAUTHORIZED,
        "Invalid or missing API token",
        &state.service.options().style,
    );
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        axum::http::HeaderValue::from_static("Bearer"),
    );
    response
}
