/// Configuration for tracing initialization.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub environment: String,
    pub json_format: bool,
    /// Base directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl TracingConfig {
    pub fn new(environment: impl Into<String>, json_format: bool, level: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            json_format,
            level: level.into(),
        }
    }

    pub(super) fn env_filter_directives(&self) -> String {
        let level = match self.level.trim() {
            "" => "info".to_string(),
            other => other.to_lowercase(),
        };
        format!("{},subgen=debug,tower_http=debug", level)
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            environment: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            json_format: std::env::var("LOG_FORMAT")
                .map(|v| v.to_lowercase() == "json")
                .unwrap_or(false),
            level: "info".to_string(),
        }
    }
}
