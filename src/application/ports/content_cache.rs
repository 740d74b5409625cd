use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::{CachedTranscript, Fingerprint, TranscriptRecord};

/// Fingerprint-addressed store for downloaded media and transcript records.
///
/// Every operation is best effort. Lookups report failures as misses and
/// stores log and swallow their errors, so callers never fail a request
/// because of the cache.
#[async_trait]
pub trait ContentCache: Send + Sync {
    /// Path of a live cached media file, if any. Expired files are removed.
    async fn lookup_media(&self, fingerprint: &Fingerprint, extension: &str) -> Option<PathBuf>;

    /// Copies `source` into the cache and returns the cached path, or
    /// `source` itself when the copy could not be made.
    async fn store_media(&self, fingerprint: &Fingerprint, source: &Path) -> PathBuf;

    async fn lookup_transcript(&self, fingerprint: &Fingerprint) -> Option<CachedTranscript>;

    async fn store_transcript(&self, fingerprint: &Fingerprint, record: &TranscriptRecord);

    /// Removes every expired entry and returns how many were deleted.
    async fn sweep_expired(&self) -> usize;
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
