use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, File};
use serde::Deserialize;

use crate::domain::SubtitleStyle;

use super::Environment;

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub cache: CacheSettings,
    pub engine: EngineSettings,
    pub processing: ProcessingSettings,
    pub subtitle: SubtitleSettings,
    pub fetch: FetchSettings,
    pub logging: LoggingSettings,
}

impl Settings {
    /// Layers built-in defaults, `config/appsettings.<env>` (optional) and
    /// `APP__SECTION__KEY` environment variables, later sources winning.
    pub fn load(environment: Environment) -> Result<Self, ConfigError> {
        let file = format!("config/appsettings.{}", environment.as_str());

        Config::builder()
            .add_source(File::with_name(&file).required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Bearer token required on `/api/*`; empty disables auth.
    pub api_token: String,
    /// Scratch space for uploads and downloads.
    pub work_dir: PathBuf,
    pub max_upload_mb: usize,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_token: String::new(),
            work_dir: PathBuf::from("./tmp"),
            max_upload_mb: 512,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    pub enabled: bool,
    pub dir: PathBuf,
    pub retention_days: u64,
    pub sweep_interval_secs: u64,
}

impl CacheSettings {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from("./cache"),
            retention_days: 7,
            sweep_interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub model_id: String,
    pub prefer_accelerator: bool,
    pub idle_timeout_secs: u64,
    pub check_interval_secs: u64,
    pub batch_size_s: u32,
    pub enable_timestamp: bool,
    /// Forces the decoding language (e.g. `zh`); auto-detected when unset.
    pub language: Option<String>,
}

impl EngineSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            model_id: "openai/whisper-base".to_string(),
            prefer_accelerator: true,
            idle_timeout_secs: 300,
            check_interval_secs: 60,
            batch_size_s: 300,
            enable_timestamp: true,
            language: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessingSettings {
    pub max_segment_length: usize,
    pub duration_per_segment: f64,
    pub chinese_ratio_threshold: f64,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            max_segment_length: 20,
            duration_per_segment: 3.0,
            chinese_ratio_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubtitleSettings {
    pub font_size: f64,
    pub font_color: String,
    pub background_alpha: f64,
    pub background_color: String,
    pub stroke: String,
    pub kind: String,
    pub version: String,
}

impl SubtitleSettings {
    pub fn style(&self) -> SubtitleStyle {
        SubtitleStyle {
            font_size: self.font_size,
            font_color: self.font_color.clone(),
            background_alpha: self.background_alpha,
            background_color: self.background_color.clone(),
            stroke: self.stroke.clone(),
            kind: self.kind.clone(),
            version: self.version.clone(),
        }
    }
}

impl Default for SubtitleSettings {
    fn default() -> Self {
        let style = SubtitleStyle::default();
        Self {
            font_size: style.font_size,
            font_color: style.font_color,
            background_alpha: style.background_alpha,
            background_color: style.background_color,
            stroke: style.stroke,
            kind: style.kind,
            version: style.version,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub timeout_secs: u64,
}

impl FetchSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            user_agent: None,
            referer: None,
            timeout_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub enable_json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            enable_json: false,
        }
    }
}
