use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;

use crate::application::ports::{
    ContentCache, EngineError, FetchRequest, GenerateOptions, MediaFetchError, MediaFetcher,
    RecognitionResult,
};
use crate::domain::{
    ContentIdentity, Fingerprint, SegmentationOptions, SubtitleStyle, TranscriptRecord,
    build_subtitle_body, detect_language, extension_from_locator,
};

use super::engine_lifecycle::{EngineHandle, EngineLifecycle};

#[derive(Debug, Clone)]
pub struct TranscriptionOptions {
    pub generate: GenerateOptions,
    pub segmentation: SegmentationOptions,
    pub chinese_ratio_threshold: f64,
    pub style: SubtitleStyle,
}

impl Default for TranscriptionOptions {
    fn default() -> Self {
        Self {
            generate: GenerateOptions::default(),
            segmentation: SegmentationOptions::default(),
            chinese_ratio_threshold: 0.3,
            style: SubtitleStyle::default(),
        }
    }
}

/// Remote media to fetch and transcribe.
#[derive(Debug, Clone)]
pub struct RemoteMedia {
    pub url: String,
    pub content_id: Option<String>,
    pub stream_id: Option<String>,
    pub cookie: Option<String>,
}

impl RemoteMedia {
    pub fn identity(&self) -> ContentIdentity {
        ContentIdentity::new(
            self.content_id.clone(),
            self.stream_id.clone(),
            Some(self.url.clone()),
        )
    }
}

/// Request-level orchestration: consults the cache, downloads media, runs
/// the engine and formats its output into a subtitle transcript.
pub struct TranscriptionService {
    lifecycle: Arc<EngineLifecycle>,
    cache: Arc<dyn ContentCache>,
    fetcher: Arc<dyn MediaFetcher>,
    options: TranscriptionOptions,
    work_dir: PathBuf,
}

impl TranscriptionService {
    pub fn new(
        lifecycle: Arc<EngineLifecycle>,
        cache: Arc<dyn ContentCache>,
        fetcher: Arc<dyn MediaFetcher>,
        options: TranscriptionOptions,
        work_dir: PathBuf,
    ) -> Self {
        Self {
            lifecycle,
            cache,
            fetcher,
            options,
            work_dir,
        }
    }

    pub fn lifecycle(&self) -> &Arc<EngineLifecycle> {
        &self.lifecycle
    }

    pub fn cache(&self) -> &Arc<dyn ContentCache> {
        &self.cache
    }

    pub fn options(&self) -> &TranscriptionOptions {
        &self.options
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Transcribes an uploaded file. The transcript cache is consulted only
    /// when the caller supplied identity material for the upload.
    #[tracing::instrument(skip(self, identity, audio_path))]
    pub async fn transcribe_upload(
        &self,
        identity: &ContentIdentity,
        audio_path: &Path,
        filename: &str,
    ) -> Result<TranscriptRecord, TranscriptionError> {
        let fingerprint = (!identity.is_degenerate()).then(|| Fingerprint::derive(identity));

        if let Some(fingerprint) = &fingerprint {
            if let Some(cached) = self.cache.lookup_transcript(fingerprint).await {
                tracing::info!(fingerprint = %fingerprint, "Serving cached transcript");
                return Ok(cached.into_record());
            }
        }

        let record = self.transcribe_file(audio_path).await?;

        if let Some(fingerprint) = &fingerprint {
            self.cache.store_transcript(fingerprint, &record).await;
        }

        Ok(record)
    }

    /// Fetches remote media (reusing a cached download when possible) and
    /// transcribes it, caching both the media and the transcript.
    #[tracing::instrument(skip(self, media), fields(url = %media.url))]
    pub async fn transcribe_remote(
        &self,
        media: &RemoteMedia,
    ) -> Result<TranscriptRecord, TranscriptionError> {
        if media.url.trim().is_empty() {
            return Err(TranscriptionError::InvalidRequest(
                "url must not be empty".to_string(),
            ));
        }

        let fingerprint = Fingerprint::derive(&media.identity());

        if let Some(cached) = self.cache.lookup_transcript(&fingerprint).await {
            tracing::info!(fingerprint = %fingerprint, "Serving cached transcript");
            return Ok(cached.into_record());
        }

        let extension = extension_from_locator(&media.url);

        // Keeps a fresh download alive until inference finishes when the cache declines to copy it.
        let mut _download_dir = None;
        let cached_media = self.cache.lookup_media(&fingerprint, &extension).await;
        let from_cache = cached_media.is_some();
        let audio_path = match cached_media {
            Some(path) => {
                tracing::info!(fingerprint = %fingerprint, "Reusing cached media");
                path
            }
            None => {
                let (dir, stored) = self.download(media, &fingerprint, &extension).await?;
                _download_dir = Some(dir);
                stored
            }
        };

        let outcome = self.transcribe_file(&audio_path).await;
        let vanished = from_cache
            && matches!(outcome, Err(TranscriptionError::Inference(_)))
            && !tokio::fs::try_exists(&audio_path).await.unwrap_or(false);

        let record = if vanished {
            // The janitor removed the entry between lookup and decode.
            tracing::warn!(
                fingerprint = %fingerprint,
                path = %audio_path.display(),
                "Cached media vanished before decoding, fetching again"
            );
            let (dir, stored) = self.download(media, &fingerprint, &extension).await?;
            _download_dir = Some(dir);
            self.transcribe_file(&stored).await?
        } else {
            outcome?
        };
        self.cache.store_transcript(&fingerprint, &record).await;

        Ok(record)
    }

    async fn download(
        &self,
        media: &RemoteMedia,
        fingerprint: &Fingerprint,
        extension: &str,
    ) -> Result<(TempDir, PathBuf), TranscriptionError> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let dir = tempfile::Builder::new()
            .prefix("download-")
            .tempdir_in(&self.work_dir)?;
        let destination = dir.path().join(format!("{}{}", fingerprint, extension));

        let request = FetchRequest {
            url: media.url.clone(),
            cookie: media.cookie.clone(),
        };
        let downloaded = self.fetcher.fetch(&request, &destination).await?;
        let stored = self.cache.store_media(fingerprint, &downloaded).await;

        Ok((dir, stored))
    }

    /// Runs the engine on a local file without touching the cache.
    pub async fn transcribe_file(
        &self,
        audio_path: &Path,
    ) -> Result<TranscriptRecord, TranscriptionError> {
        let handle = self
            .lifecycle
            .acquire()
            .await
            .map_err(TranscriptionError::EngineLoad)?;

        tracing::info!(path = %audio_path.display(), device = %handle.device(), "Starting recognition");

        let results = match handle.generate(audio_path, &self.options.generate).await {
            Ok(results) => results,
            Err(e) if e.is_resource_exhausted() => {
                tracing::error!(error = %e, "Engine ran out of memory during inference, unloading");
                drop(handle);
                self.lifecycle.force_unload().await;
                return Err(TranscriptionError::Inference(e));
            }
            Err(e) => return Err(TranscriptionError::Inference(e)),
        };

        self.lifecycle.mark_used();

        Ok(self.build_record(&handle, &results))
    }

    fn build_record(&self, handle: &EngineHandle, results: &[RecognitionResult]) -> TranscriptRecord {
        let first = results.first();
        let text = first.map(|r| r.text.trim().to_string()).unwrap_or_default();

        let lang = detect_language(&text, self.options.chinese_ratio_threshold);
        tracing::info!(lang, chars = text.chars().count(), "Detected transcript language");

        let sentences = if self.options.generate.sentence_timestamps {
            first.and_then(|r| r.sentence_info.as_deref())
        } else {
            None
        };
        if let Some(sentences) = sentences {
            tracing::debug!(sentences = sentences.len(), "Engine returned sentence timestamps");
        }

        let body = build_subtitle_body(&text, sentences, &self.options.segmentation);

        TranscriptRecord {
            text,
            lang: lang.to_string(),
            style: self.options.style.clone(),
            body,
            device_used: handle.device().to_string(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("Model load failed: {0}")]
    EngineLoad(EngineError),
    #[error("{0}")]
    Inference(EngineError),
    #[error("media fetch failed: {0}")]
    Fetch(#[from] MediaFetchError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TranscriptionError {
    /// True for failures a client may retry: the engine ran out of device
    /// resources and has been reset.
    pub fn is_transient(&self) -> bool {
        match self {
            TranscriptionError::EngineLoad(e) | TranscriptionError::Inference(e) => {
                e.is_resource_exhausted()
            }
            _ => false,
        }
    }
}
