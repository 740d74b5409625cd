mod device_class;
mod fingerprint;
mod language;
mod media_extension;
mod subtitle;
mod transcript;

pub use device_class::DeviceClass;
pub use fingerprint::{ContentIdentity, Fingerprint};
pub use language::{DEFAULT_LANGUAGE, detect_language};
pub use media_extension::{DEFAULT_MEDIA_EXTENSION, extension_from_locator, extension_of};
pub use subtitle::{SegmentationOptions, SentenceInfo, build_subtitle_body, split_text_into_segments};
pub use transcript::{
    CachedTranscript, SUBTITLE_LOCATION_BOTTOM, SubtitleEntry, SubtitleStyle, TranscriptRecord,
};
