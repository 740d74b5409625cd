use std::sync::Arc;

use async_trait::async_trait;
use candle_core::Device;

use crate::application::ports::{EngineError, EngineLoader, Transcriber};
use crate::domain::DeviceClass;

use super::candle_whisper_engine::CandleWhisperEngine;

/// Builds [`CandleWhisperEngine`] instances on CUDA, Metal, or CPU.
pub struct CandleWhisperLoader {
    model_id: String,
    language: Option<String>,
}

impl CandleWhisperLoader {
    pub fn new(model_id: impl Into<String>, language: Option<String>) -> Self {
        Self {
            model_id: model_id.into(),
            language: language.filter(|l| !l.is_empty()),
        }
    }

    fn select_device(device: DeviceClass) -> Result<Device, EngineError> {
        match device {
            DeviceClass::Cpu => Ok(Device::Cpu),
            DeviceClass::Accelerator => {
                if candle_core::utils::cuda_is_available() {
                    Device::new_cuda(0).map_err(|e| {
                        EngineError::classify(format!("cuda: {}", e), EngineError::DeviceUnavailable)
                    })
                } else if candle_core::utils::metal_is_available() {
                    Device::new_metal(0).map_err(|e| {
                        EngineError::classify(format!("metal: {}", e), EngineError::DeviceUnavailable)
                    })
                } else {
                    Err(EngineError::DeviceUnavailable(
                        "no CUDA or Metal device available".to_string(),
                    ))
                }
            }
        }
    }
}

#[async_trait]
impl EngineLoader for CandleWhisperLoader {
    fn accelerator_available(&self) -> bool {
        candle_core::utils::cuda_is_available() || candle_core::utils::metal_is_available()
    }

    async fn load(&self, device: DeviceClass) -> Result<Arc<dyn Transcriber>, EngineError> {
        let model_id = self.model_id.clone();
        let language = self.language.clone();

        let engine = tokio::task::spawn_blocking(move || {
            let target = Self::select_device(device)?;
            CandleWhisperEngine::load(&model_id, target, language.as_deref())
        })
        .await
        .map_err(|e| EngineError::ModelLoadFailed(format!("load task: {}", e)))??;

        Ok(Arc::new(engine))
    }

    fn release_device_memory(&self, device: DeviceClass) {
        // candle frees device buffers when the last tensor referencing them drops
        tracing::debug!(device = %device, "Device memory released with engine instance");
    }
}
