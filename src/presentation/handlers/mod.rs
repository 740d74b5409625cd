mod cache;
mod engine;
mod error;
mod health;
mod transcribe;

pub use cache::cache_sweep_handler;
pub use engine::{engine_status_handler, engine_unload_handler};
pub use error::{ErrorResponse, RETRY_AFTER_SECS, error_response, transcription_error_response};
pub use health::health_handler;
pub use transcribe::{
    RemoteTranscribeRequest, TranscriptResponse, transcribe_handler, transcribe_remote_handler,
};
