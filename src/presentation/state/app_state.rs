use std::sync::Arc;

use crate::application::services::TranscriptionService;
use crate::presentation::config::Settings;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TranscriptionService>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(service: Arc<TranscriptionService>, settings: Settings) -> Self {
        Self {
            service,
            settings: Arc::new(settings),
        }
    }

    /// Bearer token guarding `/api/*`, if one is configured.
    pub fn api_token(&self) -> Option<&str> {
        Some(self.settings.server.api_token.as_str()).filter(|t| !t.is_empty())
    }
}
