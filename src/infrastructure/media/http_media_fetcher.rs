use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{COOKIE, REFERER, USER_AGENT};
use tokio::io::AsyncWriteExt;

use crate::application::ports::{FetchRequest, MediaFetchError, MediaFetcher};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Streams remote media to disk with a browser-like user agent.
pub struct HttpMediaFetcher {
    client: reqwest::Client,
    user_agent: String,
    referer: Option<String>,
}

impl HttpMediaFetcher {
    pub fn new(
        user_agent: Option<String>,
        referer: Option<String>,
        timeout: Duration,
    ) -> Result<Self, MediaFetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MediaFetchError::RequestFailed(format!("client: {}", e)))?;

        Ok(Self {
            client,
            user_agent: user_agent
                .filter(|ua| !ua.is_empty())
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            referer: referer.filter(|r| !r.is_empty()),
        })
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(
        &self,
        request: &FetchRequest,
        destination: &Path,
    ) -> Result<PathBuf, MediaFetchError> {
        let url = reqwest::Url::parse(&request.url)
            .map_err(|e| MediaFetchError::InvalidUrl(format!("{}: {}", request.url, e)))?;

        let mut builder = self.client.get(url).header(USER_AGENT, &self.user_agent);
        if let Some(referer) = &self.referer {
            builder = builder.header(REFERER, referer);
        }
        if let Some(cookie) = request.cookie.as_deref().filter(|c| !c.is_empty()) {
            builder = builder.header(COOKIE, cookie);
        }

        tracing::info!(destination = %destination.display(), "Starting media download");

        let response = builder
            .send()
            .await
            .map_err(|e| MediaFetchError::RequestFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(MediaFetchError::UpstreamStatus { status, body });
        }

        if let Some(total) = response.content_length() {
            tracing::debug!(bytes = total, "Remote media size");
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let started = Instant::now();
        let mut file = tokio::fs::File::create(destination).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(destination).await;
                    return Err(MediaFetchError::RequestFailed(format!("body: {}", e)));
                }
            };
            written += bytes.len() as u64;
            file.write_all(&bytes).await?;
        }
        file.flush().await?;

        tracing::info!(
            bytes = written,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Media download completed"
        );

        Ok(destination.to_path_buf())
    }
}
