use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Vertical placement code the subtitle consumer expects for bottom-aligned lines.
pub const SUBTITLE_LOCATION_BOTTOM: u8 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    /// Start time in seconds, two decimal places.
    pub from: f64,
    /// End time in seconds, two decimal places.
    pub to: f64,
    pub sid: u32,
    pub location: u8,
    pub content: String,
    pub music: u8,
}

impl SubtitleEntry {
    pub fn new(sid: u32, from_secs: f64, to_secs: f64, content: impl Into<String>) -> Self {
        Self {
            from: round_centis(from_secs),
            to: round_centis(to_secs),
            sid,
            location: SUBTITLE_LOCATION_BOTTOM,
            content: content.into(),
            music: 0,
        }
    }
}

fn round_centis(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

/// Presentation metadata stamped onto every transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleStyle {
    pub font_size: f64,
    pub font_color: String,
    pub background_alpha: f64,
    pub background_color: String,
    #[serde(rename = "Stroke")]
    pub stroke: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_size: 0.4,
            font_color: "#FFFFFF".to_string(),
            background_alpha: 0.5,
            background_color: "#9C27B0".to_string(),
            stroke: "none".to_string(),
            kind: "manual_transcribe".to_string(),
            version: "v1".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub text: String,
    pub lang: String,
    #[serde(flatten)]
    pub style: SubtitleStyle,
    pub body: Vec<SubtitleEntry>,
    pub device_used: String,
    pub created_at: DateTime<Utc>,
}

/// A transcript as persisted in the cache: the record plus the unix time it was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedTranscript {
    #[serde(flatten)]
    pub record: TranscriptRecord,
    pub cached_at: f64,
}

impl CachedTranscript {
    pub fn now(record: TranscriptRecord) -> Self {
        Self {
            record,
            cached_at: Utc::now().timestamp_millis() as f64 / 1000.0,
        }
    }

    pub fn into_record(self) -> TranscriptRecord {
        self.record
    }
}
