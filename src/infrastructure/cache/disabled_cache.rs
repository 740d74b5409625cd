use std::path::{Path, PathBuf};

use crate::application::ports::ContentCache;
use crate::domain::{CachedTranscript, Fingerprint, TranscriptRecord};

/// Pass-through used when caching is switched off: never hits, never writes.
pub struct DisabledContentCache;

#[async_trait::async_trait]
impl ContentCache for DisabledContentCache {
    async fn lookup_media(&self, _fingerprint: &Fingerprint, _extension: &str) -> Option<PathBuf> {
        None
    }

    async fn store_media(&self, _fingerprint: &Fingerprint, source: &Path) -> PathBuf {
        source.to_path_buf()
    }

    async fn lookup_transcript(&self, _fingerprint: &Fingerprint) -> Option<CachedTranscript> {
        None
    }

    async fn store_transcript(&self, _fingerprint: &Fingerprint, _record: &TranscriptRecord) {}

    async fn sweep_expired(&self) -> usize {
        0
    }
}
