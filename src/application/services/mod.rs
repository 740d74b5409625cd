mod background;
mod engine_lifecycle;
mod transcription_service;

pub use background::{join_background, spawn_cache_janitor, spawn_idle_monitor};
pub use engine_lifecycle::{
    EngineHandle, EngineLifecycle, EngineState, EngineStatus, LifecycleConfig,
};
pub use transcription_service::{
    RemoteMedia, TranscriptionError, TranscriptionOptions, TranscriptionService,
};
