use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use uuid::Uuid;

use crate::application::ports::{CacheError, ContentCache};
use crate::domain::{CachedTranscript, Fingerprint, TranscriptRecord, extension_of};

pub const TRANSCRIPT_DIR: &str = "transcripts";
const TRANSCRIPT_EXTENSION: &str = "json";

/// Directory-backed cache.
///
/// Layout: `<root>/<fingerprint><ext>` for media and
/// `<root>/transcripts/<fingerprint>.json` for transcripts. An entry's age is
/// its file modification time, so rewriting an entry restarts its TTL.
/// Writes land in a hidden temp file first and are renamed into place, so
/// concurrent writers of the same fingerprint leave exactly one complete file.
/// A temp file left behind by a crash is swept once it outlives the TTL.
pub struct FileContentCache {
    root: PathBuf,
    transcripts: PathBuf,
    ttl: Duration,
}

impl FileContentCache {
    pub fn new(root: PathBuf, ttl: Duration) -> Result<Self, CacheError> {
        let transcripts = root.join(TRANSCRIPT_DIR);
        std::fs::create_dir_all(&transcripts)?;

        tracing::info!(
            root = %root.display(),
            ttl_secs = ttl.as_secs(),
            "Content cache enabled"
        );

        Ok(Self {
            root,
            transcripts,
            ttl,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn media_path(&self, fingerprint: &Fingerprint, extension: &str) -> PathBuf {
        self.root.join(format!("{}{}", fingerprint, extension))
    }

    pub fn transcript_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.transcripts
            .join(format!("{}.{}", fingerprint, TRANSCRIPT_EXTENSION))
    }

    fn is_expired(&self, metadata: &Metadata) -> bool {
        age_of(metadata) > self.ttl
    }

    /// Whether `path` holds a live entry. An expired entry is deleted on the spot.
    async fn check_live(&self, path: &Path) -> Result<bool, CacheError> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        if !self.is_expired(&metadata) {
            return Ok(true);
        }

        remove_if_present(path).await?;
        tracing::info!(path = %path.display(), "Removed expired cache entry");
        Ok(false)
    }

    async fn try_store_media(
        &self,
        fingerprint: &Fingerprint,
        source: &Path,
    ) -> Result<PathBuf, CacheError> {
        let destination = self.media_path(fingerprint, &extension_of(source));
        let staging = staging_path(&self.root, fingerprint);

        if let Err(e) = tokio::fs::copy(source, &staging).await {
            let _ = remove_if_present(&staging).await;
            return Err(e.into());
        }
        publish(&staging, &destination).await?;

        Ok(destination)
    }

    async fn try_lookup_transcript(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<CachedTranscript>, CacheError> {
        let path = self.transcript_path(fingerprint);
        if !self.check_live(&path).await? {
            return Ok(None);
        }

        let bytes = tokio::fs::read(&path).await?;
        match serde_json::from_slice::<CachedTranscript>(&bytes) {
            Ok(cached) => Ok(Some(cached)),
            Err(e) => {
                tracing::error!(
                    fingerprint = %fingerprint,
                    error = %e,
                    "Corrupt cached transcript, discarding"
                );
                remove_if_present(&path).await?;
                Ok(None)
            }
        }
    }

    async fn try_store_transcript(
        &self,
        fingerprint: &Fingerprint,
        record: &TranscriptRecord,
    ) -> Result<PathBuf, CacheError> {
        let cached = CachedTranscript::now(record.clone());
        let json = serde_json::to_vec_pretty(&cached)?;

        let destination = self.transcript_path(fingerprint);
        let staging = staging_path(&self.transcripts, fingerprint);

        if let Err(e) = tokio::fs::write(&staging, json).await {
            let _ = remove_if_present(&staging).await;
            return Err(e.into());
        }
        publish(&staging, &destination).await?;

        Ok(destination)
    }

    async fn sweep_dir(&self, dir: &Path) -> Result<usize, CacheError> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(path = %entry.path().display(), error = %e, "Failed to stat cache entry");
                    continue;
                }
            };
            // Staging files younger than the TTL may belong to a write in progress.
            if !metadata.is_file() || !self.is_expired(&metadata) {
                continue;
            }
            if is_staging(&entry.file_name().to_string_lossy()) {
                tracing::warn!(path = %entry.path().display(), "Removing orphaned staging file");
            }

            match remove_if_present(&entry.path()).await {
                Ok(()) => {
                    removed += 1;
                    tracing::debug!(path = %entry.path().display(), "Swept expired cache entry");
                }
                Err(e) => {
                    tracing::error!(path = %entry.path().display(), error = %e, "Failed to delete expired cache entry");
                }
            }
        }

        Ok(removed)
    }
}

#[async_trait]
impl ContentCache for FileContentCache {
    async fn lookup_media(&self, fingerprint: &Fingerprint, extension: &str) -> Option<PathBuf> {
        let path = self.media_path(fingerprint, extension);
        match self.check_live(&path).await {
            Ok(true) => {
                tracing::info!(fingerprint = %fingerprint, "Media cache hit");
                Some(path)
            }
            Ok(false) => None,
            Err(e) => {
                tracing::warn!(fingerprint = %fingerprint, error = %e, "Media cache lookup failed");
                None
            }
        }
    }

    async fn store_media(&self, fingerprint: &Fingerprint, source: &Path) -> PathBuf {
        match self.try_store_media(fingerprint, source).await {
            Ok(path) => {
                tracing::info!(fingerprint = %fingerprint, path = %path.display(), "Media cached");
                path
            }
            Err(e) => {
                tracing::error!(
                    fingerprint = %fingerprint,
                    source = %source.display(),
                    error = %e,
                    "Failed to cache media, using uncached file"
                );
                source.to_path_buf()
            }
        }
    }

    async fn lookup_transcript(&self, fingerprint: &Fingerprint) -> Option<CachedTranscript> {
        match self.try_lookup_transcript(fingerprint).await {
            Ok(Some(cached)) => {
                tracing::info!(fingerprint = %fingerprint, "Transcript cache hit");
                Some(cached)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(fingerprint = %fingerprint, error = %e, "Transcript cache lookup failed");
                None
            }
        }
    }

    async fn store_transcript(&self, fingerprint: &Fingerprint, record: &TranscriptRecord) {
        match self.try_store_transcript(fingerprint, record).await {
            Ok(_) => tracing::info!(fingerprint = %fingerprint, "Transcript cached"),
            Err(e) => {
                tracing::error!(fingerprint = %fingerprint, error = %e, "Failed to cache transcript")
            }
        }
    }

    async fn sweep_expired(&self) -> usize {
        tracing::info!(root = %self.root.display(), "Sweeping expired cache entries");

        let mut removed = 0;
        for dir in [&self.root, &self.transcripts] {
            match self.sweep_dir(dir).await {
                Ok(n) => removed += n,
                Err(e) => {
                    tracing::error!(dir = %dir.display(), error = %e, "Cache sweep failed")
                }
            }
        }

        tracing::info!(removed, "Cache sweep finished");
        removed
    }
}

fn age_of(metadata: &Metadata) -> Duration {
    metadata
        .modified()
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .unwrap_or_default()
}

const STAGING_SUFFIX: &str = ".part";

fn staging_path(dir: &Path, fingerprint: &Fingerprint) -> PathBuf {
    dir.join(format!(".{}.{}{}", fingerprint, Uuid::new_v4(), STAGING_SUFFIX))
}

fn is_staging(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(STAGING_SUFFIX)
}

async fn publish(staging: &Path, destination: &Path) -> Result<(), CacheError> {
    if let Err(e) = tokio::fs::rename(staging, destination).await {
        let _ = remove_if_present(staging).await;
        return Err(e.into());
    }
    Ok(())
}

async fn remove_if_present(path: &Path) -> io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
