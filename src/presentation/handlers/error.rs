use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::ports::MediaFetchError;
use crate::application::services::TranscriptionError;
use crate::domain::SubtitleStyle;

/// Seconds a client should wait before retrying after a transient engine failure.
pub const RETRY_AFTER_SECS: u64 = 30;

/// Failure envelope; mirrors a transcript with an empty body so subtitle
/// consumers can parse both with one schema.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    pub body: Vec<serde_json::Value>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, style: &SubtitleStyle) -> Self {
        Self {
            status: "error",
            message: message.into(),
            kind: style.kind.clone(),
            version: style.version.clone(),
            body: Vec::new(),
        }
    }
}

pub fn error_response(status: StatusCode, message: impl Into<String>, style: &SubtitleStyle) -> Response {
    (status, Json(ErrorResponse::new(message, style))).into_response()
}

pub fn transcription_error_response(error: &TranscriptionError, style: &SubtitleStyle) -> Response {
    let status = status_for(error);

    if status.is_server_error() {
        tracing::error!(error = %error, status = status.as_u16(), "Transcription failed");
    } else {
        tracing::warn!(error = %error, status = status.as_u16(), "Transcription rejected");
    }

    let mut response = error_response(status, error.to_string(), style);
    if error.is_transient() {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(RETRY_AFTER_SECS));
    }
    response
}

fn status_for(error: &TranscriptionError) -> StatusCode {
    if error.is_transient() {
        return StatusCode::SERVICE_UNAVAILABLE;
    }
    match error {
        TranscriptionError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        TranscriptionError::Fetch(MediaFetchError::InvalidUrl(_)) => StatusCode::BAD_REQUEST,
        TranscriptionError::Fetch(_) => StatusCode::BAD_GATEWAY,
        TranscriptionError::EngineLoad(_)
        | TranscriptionError::Inference(_)
        | TranscriptionError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
