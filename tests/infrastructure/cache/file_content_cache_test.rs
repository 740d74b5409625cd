use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use subgen::application::ports::ContentCache;
use subgen::domain::{ContentIdentity, Fingerprint};
use subgen::infrastructure::cache::{
    ContentCacheFactory, DisabledContentCache, FileContentCache, TRANSCRIPT_DIR,
};
use subgen::presentation::config::CacheSettings;

use crate::helpers::{sample_record, write_audio};

const DAY: Duration = Duration::from_secs(86_400);

fn fingerprint(name: &str) -> Fingerprint {
    Fingerprint::derive(&ContentIdentity::from_locator(format!("https://example.com/{}", name)))
}

fn open_cache(dir: &TempDir, ttl: Duration) -> FileContentCache {
    FileContentCache::new(dir.path().join("cache"), ttl).unwrap()
}

fn backdate(path: &Path, age: Duration) {
    let file = std::fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() - age).unwrap();
}

fn visible_entries(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn given_stored_transcript_when_looked_up_then_round_trips_with_cached_at() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir, 7 * DAY);
    let fp = fingerprint("a");
    let record = sample_record("你好");

    cache.store_transcript(&fp, &record).await;
    let cached = cache.lookup_transcript(&fp).await.unwrap();

    assert_eq!(cached.record, record);
    assert!(cached.cached_at > 0.0);

    let raw: serde_json::Value =
        serde_json::from_slice(&std::fs::read(cache.transcript_path(&fp)).unwrap()).unwrap();
    assert!(raw["cached_at"].is_f64());
    assert_eq!(raw["type"], "manual_transcribe");
    assert_eq!(raw["Stroke"], "none");
    assert_eq!(raw["body"][0]["sid"], 1);
}

#[tokio::test]
async fn given_missing_entry_when_looked_up_then_misses() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir, 7 * DAY);

    assert!(cache.lookup_transcript(&fingerprint("none")).await.is_none());
    assert!(cache.lookup_media(&fingerprint("none"), ".mp3").await.is_none());
}

#[tokio::test]
async fn given_entry_just_inside_ttl_when_looked_up_then_hits() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir, 7 * DAY);
    let fp = fingerprint("fresh");
    cache.store_transcript(&fp, &sample_record("fresh")).await;

    backdate(&cache.transcript_path(&fp), 7 * DAY - Duration::from_secs(60));

    assert!(cache.lookup_transcript(&fp).await.is_some());
}

#[tokio::test]
async fn given_entry_past_ttl_when_looked_up_then_misses_and_file_deleted() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir, 7 * DAY);
    let fp = fingerprint("stale");
    cache.store_transcript(&fp, &sample_record("stale")).await;
    let path = cache.transcript_path(&fp);

    backdate(&path, 7 * DAY + Duration::from_secs(60));

    assert!(cache.lookup_transcript(&fp).await.is_none());
    assert!(!path.exists());
}

#[tokio::test]
async fn given_expired_media_when_looked_up_then_deleted() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir, DAY);
    let fp = fingerprint("media");
    let source = write_audio(dir.path(), "clip.m4a");
    let stored = cache.store_media(&fp, &source).await;

    backdate(&stored, 2 * DAY);

    assert!(cache.lookup_media(&fp, ".m4a").await.is_none());
    assert!(!stored.exists());
}

#[tokio::test]
async fn given_corrupt_transcript_when_looked_up_then_misses_and_file_deleted() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir, 7 * DAY);
    let fp = fingerprint("corrupt");
    let path = cache.transcript_path(&fp);
    std::fs::write(&path, b"{\"text\": \"trunc").unwrap();

    assert!(cache.lookup_transcript(&fp).await.is_none());
    assert!(!path.exists());
}

#[tokio::test]
async fn given_media_when_stored_then_copied_under_fingerprint_and_source_kept() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir, 7 * DAY);
    let fp = fingerprint("copy");
    let source = write_audio(dir.path(), "Clip.M4A");

    let stored = cache.store_media(&fp, &source).await;

    assert_eq!(stored, cache.media_path(&fp, ".m4a"));
    assert!(source.exists());
    assert_eq!(std::fs::read(&stored).unwrap(), std::fs::read(&source).unwrap());
    assert_eq!(cache.lookup_media(&fp, ".m4a").await, Some(stored));
}

#[tokio::test]
async fn given_source_without_extension_when_stored_then_default_extension_used() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir, 7 * DAY);
    let fp = fingerprint("noext");
    let source = write_audio(dir.path(), "audio");

    let stored = cache.store_media(&fp, &source).await;

    assert_eq!(stored, cache.media_path(&fp, ".mp3"));
}

#[tokio::test]
async fn given_unreadable_source_when_stored_then_source_path_returned_and_nothing_left_behind() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir, 7 * DAY);
    let missing = dir.path().join("missing.wav");

    let returned = cache.store_media(&fingerprint("missing"), &missing).await;

    assert_eq!(returned, missing);
    assert!(visible_entries(cache.root()).is_empty());
    assert_eq!(std::fs::read_dir(cache.root()).unwrap().count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn given_concurrent_stores_for_same_fingerprint_when_finished_then_exactly_one_complete_file() {
    let dir = TempDir::new().unwrap();
    let cache = Arc::new(open_cache(&dir, 7 * DAY));
    let fp = fingerprint("race");

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let fp = fp.clone();
            tokio::spawn(async move {
                cache
                    .store_transcript(&fp, &sample_record(&format!("writer {}", i)))
                    .await;
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let transcripts = cache.root().join(TRANSCRIPT_DIR);
    assert_eq!(std::fs::read_dir(&transcripts).unwrap().count(), 1);
    let cached = cache.lookup_transcript(&fp).await.unwrap();
    assert!(cached.record.text.starts_with("writer "));
}

#[tokio::test]
async fn given_rewrite_when_stored_then_last_writer_wins() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir, 7 * DAY);
    let fp = fingerprint("rewrite");

    cache.store_transcript(&fp, &sample_record("first")).await;
    cache.store_transcript(&fp, &sample_record("second")).await;

    assert_eq!(cache.lookup_transcript(&fp).await.unwrap().record.text, "second");
}

#[tokio::test]
async fn given_mixed_entries_when_swept_then_only_expired_removed() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir, DAY);
    let source = write_audio(dir.path(), "clip.mp3");

    let old_media = cache.store_media(&fingerprint("old"), &source).await;
    let new_media = cache.store_media(&fingerprint("new"), &source).await;
    cache.store_transcript(&fingerprint("old"), &sample_record("old")).await;
    cache.store_transcript(&fingerprint("new"), &sample_record("new")).await;
    backdate(&old_media, 3 * DAY);
    backdate(&cache.transcript_path(&fingerprint("old")), 3 * DAY);

    let removed = cache.sweep_expired().await;

    assert_eq!(removed, 2);
    assert!(!old_media.exists());
    assert!(new_media.exists());
    assert!(cache.transcript_path(&fingerprint("new")).exists());
    assert!(cache.root().join(TRANSCRIPT_DIR).is_dir());
}

#[tokio::test]
async fn given_orphaned_staging_files_when_swept_then_only_stale_ones_removed() {
    let dir = TempDir::new().unwrap();
    let cache = open_cache(&dir, DAY);
    let transcripts = cache.root().join(TRANSCRIPT_DIR);
    let stale = transcripts.join(".deadbeef.1234.part");
    let in_flight = cache.root().join(".cafebabe.5678.part");
    std::fs::write(&stale, b"{").unwrap();
    std::fs::write(&in_flight, b"partial").unwrap();
    backdate(&stale, 30 * DAY);

    let removed = cache.sweep_expired().await;

    assert_eq!(removed, 1);
    assert!(!stale.exists());
    assert!(in_flight.exists());
}

#[tokio::test]
async fn given_disabled_cache_when_used_then_passes_through() {
    let dir = TempDir::new().unwrap();
    let cache = DisabledContentCache;
    let fp = fingerprint("disabled");
    let source = write_audio(dir.path(), "clip.mp3");

    cache.store_transcript(&fp, &sample_record("x")).await;

    assert_eq!(cache.store_media(&fp, &source).await, source);
    assert!(cache.lookup_media(&fp, ".mp3").await.is_none());
    assert!(cache.lookup_transcript(&fp).await.is_none());
    assert_eq!(cache.sweep_expired().await, 0);
}

#[tokio::test]
async fn given_disabled_settings_when_factory_creates_then_no_directory_written() {
    let dir = TempDir::new().unwrap();
    let settings = CacheSettings {
        enabled: false,
        dir: dir.path().join("cache"),
        ..CacheSettings::default()
    };

    let cache = ContentCacheFactory::create(&settings).unwrap();

    assert!(cache.lookup_transcript(&fingerprint("x")).await.is_none());
    assert!(!dir.path().join("cache").exists());
}

#[tokio::test]
async fn given_enabled_settings_when_factory_creates_then_layout_prepared() {
    let dir = TempDir::new().unwrap();
    let settings = CacheSettings {
        enabled: true,
        dir: dir.path().join("cache"),
        retention_days: 3,
        sweep_interval_secs: 60,
    };

    let cache = ContentCacheFactory::create(&settings).unwrap();
    cache.store_transcript(&fingerprint("y"), &sample_record("y")).await;

    assert_eq!(settings.ttl(), 3 * DAY);
    assert!(cache.lookup_transcript(&fingerprint("y")).await.is_some());
    assert!(dir.path().join("cache").join(TRANSCRIPT_DIR).is_dir());
}
