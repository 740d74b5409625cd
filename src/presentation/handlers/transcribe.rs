use std::path::{Path, PathBuf};

use axum::Json;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

use crate::application::services::RemoteMedia;
use crate::domain::{ContentIdentity, TranscriptRecord, extension_of};
use crate::presentation::state::AppState;

use super::error::{error_response, transcription_error_response};

const FILE_FIELD: &str = "file";

/// Success envelope: the transcript record tagged with `"status": "success"`.
#[derive(Debug, Serialize)]
pub struct TranscriptResponse {
    pub status: &'static str,
    #[serde(flatten)]
    pub record: TranscriptRecord,
}

impl From<TranscriptRecord> for TranscriptResponse {
    fn from(record: TranscriptRecord) -> Self {
        Self {
            status: "success",
            record,
        }
    }
}

struct Upload {
    // Dropping the directory removes the uploaded file.
    _dir: TempDir,
    path: PathBuf,
    filename: String,
}

#[tracing::instrument(skip(state, multipart))]
pub async fn transcribe_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> impl IntoResponse {
    let style = &state.service.options().style;

    let mut upload: Option<Upload> = None;
    let mut content_id: Option<String> = None;
    let mut stream_id: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(f)) => f,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read multipart");
                return error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Failed to read multipart: {}", e),
                    style,
                );
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            FILE_FIELD => match save_upload(&state, field).await {
                Ok(saved) => upload = Some(saved),
                Err(message) => {
                    tracing::error!(error = %message, "Failed to store upload");
                    return error_response(StatusCode::BAD_REQUEST, message, style);
                }
            },
            "content_id" | "stream_id" => {
                let value = match field.text().await {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::error!(field = %name, error = %e, "Failed to read form field");
                        return error_response(
                            StatusCode::BAD_REQUEST,
                            format!("Failed to read {}: {}", name, e),
                            style,
                        );
                    }
                };
                if name == "content_id" {
                    content_id = Some(value);
                } else {
                    stream_id = Some(value);
                }
            }
            other => tracing::debug!(field = %other, "Ignoring unknown multipart field"),
        }
    }

    let Some(upload) = upload else {
        tracing::warn!("Transcribe request with no file");
        return error_response(StatusCode::BAD_REQUEST, "No file uploaded", style);
    };

    let identity = ContentIdentity::new(content_id, stream_id, None);

    tracing::info!(
        filename = %upload.filename,
        identified = !identity.is_degenerate(),
        "Transcribing uploaded file"
    );

    match state
        .service
        .transcribe_upload(&identity, &upload.path, &upload.filename)
        .await
    {
        Ok(record) => (StatusCode::OK, Json(TranscriptResponse::from(record))).into_response(),
        Err(e) => transcription_error_response(&e, style),
    }
}

async fn save_upload(state: &AppState, mut field: Field<'_>) -> Result<Upload, String> {
    let filename = field.file_name().unwrap_or("upload").to_string();
    let work_dir = state.service.work_dir();

    tokio::fs::create_dir_all(work_dir)
        .await
        .map_err(|e| format!("Failed to prepare work dir: {}", e))?;
    let dir = tempfile::Builder::new()
        .prefix("upload-")
        .tempdir_in(work_dir)
        .map_err(|e| format!("Failed to prepare upload dir: {}", e))?;
    let path = dir.path().join(format!("audio{}", extension_of(Path::new(&filename))));

    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| format!("Failed to create upload file: {}", e))?;
    let mut received: u64 = 0;

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| format!("Failed to read file: {}", e))?
    {
        received += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("Failed to write upload: {}", e))?;
    }
    file.flush()
        .await
        .map_err(|e| format!("Failed to write upload: {}", e))?;

    if received == 0 {
        return Err("Uploaded file is empty".to_string());
    }

    tracing::debug!(bytes = received, filename = %filename, "File data received");

    Ok(Upload {
        _dir: dir,
        path,
        filename,
    })
}

#[derive(Debug, Deserialize)]
pub struct RemoteTranscribeRequest {
    pub url: String,
    pub content_id: Option<String>,
    pub stream_id: Option<String>,
    pub cookie: Option<String>,
}

#[tracing::instrument(skip(state, request), fields(url = %request.url))]
pub async fn transcribe_remote_handler(
    State(state): State<AppState>,
    Json(request): Json<RemoteTranscribeRequest>,
) -> impl IntoResponse {
    let style = &state.service.options().style;

    let media = RemoteMedia {
        url: request.url,
        content_id: request.content_id,
        stream_id: request.stream_id,
        cookie: request.cookie,
    };

    match state.service.transcribe_remote(&media).await {
        Ok(record) => (StatusCode::OK, Json(TranscriptResponse::from(record))).into_response(),
        Err(e) => transcription_error_response(&e, style),
    }
}
