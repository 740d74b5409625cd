mod environment;
mod settings;

pub use environment::{ENVIRONMENT_VAR, Environment};
pub use settings::{
    CacheSettings, EngineSettings, FetchSettings, LoggingSettings, ProcessingSettings,
    ServerSettings, Settings, SubtitleSettings,
};
