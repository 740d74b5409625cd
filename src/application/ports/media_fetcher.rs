use std::path::{Path, PathBuf};

use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub url: String,
    pub cookie: Option<String>,
}

/// Downloads remote media into a local file.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Streams `request.url` into `destination` and returns the written path.
    async fn fetch(
        &self,
        request: &FetchRequest,
        destination: &Path,
    ) -> Result<PathBuf, MediaFetchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MediaFetchError {
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("upstream returned status {status}: {body}")]
    UpstreamStatus { status: u16, body: String },
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
