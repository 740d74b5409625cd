use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{DeviceClass, SentenceInfo};

/// Per-call knobs forwarded to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerateOptions {
    /// Amount of audio, in seconds, the engine may batch into one pass.
    pub batch_size_s: u32,
    /// Ask the engine for per-sentence timestamps.
    pub sentence_timestamps: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            batch_size_s: 300,
            sentence_timestamps: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecognitionResult {
    pub text: String,
    pub sentence_info: Option<Vec<SentenceInfo>>,
}

/// A loaded inference engine.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn generate(
        &self,
        audio_path: &Path,
        options: &GenerateOptions,
    ) -> Result<Vec<RecognitionResult>, EngineError>;
}

/// Builds engine instances. Initialization is expensive and may be retried on
/// another device class by the caller.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    fn accelerator_available(&self) -> bool;

    async fn load(&self, device: DeviceClass) -> Result<Arc<dyn Transcriber>, EngineError>;

    /// Returns cached device memory to the driver once no instance holds it.
    fn release_device_memory(&self, _device: DeviceClass) {}
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("device resources exhausted: {0}")]
    ResourceExhausted(String),
    #[error("audio decoding failed: {0}")]
    DecodingFailed(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("model loading failed: {0}")]
    ModelLoadFailed(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
}

impl EngineError {
    pub fn is_resource_exhausted(&self) -> bool {
        matches!(self, EngineError::ResourceExhausted(_))
    }

    /// Classifies a raw backend message, promoting out-of-memory reports to
    /// `ResourceExhausted` and wrapping everything else with `otherwise`.
    pub fn classify(message: impl Into<String>, otherwise: fn(String) -> EngineError) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        if lowered.contains("out of memory") || lowered.contains("out_of_memory") {
            EngineError::ResourceExhausted(message)
        } else {
            otherwise(message)
        }
    }
}
