use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use hf_hub::api::sync::Api;
use hf_hub::{Repo, RepoType};
use tokenizers::Tokenizer;
use tokio::sync::Mutex;

use crate::application::ports::{EngineError, GenerateOptions, RecognitionResult, Transcriber};
use crate::domain::SentenceInfo;

use super::audio_decoder::{TARGET_SAMPLE_RATE, decode_file_to_pcm};

const MEL_FILTERS_REPO: &str = "FL33TW00D-HF/whisper-base";
const MAX_DECODE_TOKENS: usize = 224;
const WINDOW_MS: u64 = (m::CHUNK_LENGTH as u64) * 1000;

/// Whisper running in-process on a candle device.
///
/// Inference is not reentrant: the model (and its KV cache) sits behind its
/// own mutex, independent of whoever manages this engine's lifetime.
pub struct CandleWhisperEngine {
    model: Arc<Mutex<m::model::Whisper>>,
    shared: Arc<WhisperShared>,
}

struct WhisperShared {
    tokenizer: Tokenizer,
    config: Config,
    device: Device,
    mel_filters: Vec<f32>,
    language_token: Option<u32>,
}

impl CandleWhisperEngine {
    /// Downloads (or reuses) weights from the Hugging Face hub and places the
    /// model on `device`. Blocking; call from a blocking-capable thread.
    pub fn load(
        model_id: &str,
        device: Device,
        language: Option<&str>,
    ) -> Result<Self, EngineError> {
        tracing::info!(device = ?device, model = model_id, "Initializing Candle Whisper engine");

        let api = Api::new().map_err(|e| EngineError::ModelLoadFailed(e.to_string()))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let fetch = |repo: &hf_hub::api::sync::ApiRepo, file: &str| {
            repo.get(file)
                .map_err(|e| EngineError::ModelLoadFailed(format!("{}: {}", file, e)))
        };
        let config_path = fetch(&repo, "config.json")?;
        let tokenizer_path = fetch(&repo, "tokenizer.json")?;
        let weights_path = fetch(&repo, "model.safetensors")?;
        let mel_repo = api.repo(Repo::new(MEL_FILTERS_REPO.to_string(), RepoType::Model));
        let mel_path = fetch(&mel_repo, "melfilters.bytes")?;

        let config: Config = std::fs::read_to_string(&config_path)
            .map_err(|e| EngineError::ModelLoadFailed(format!("read config: {}", e)))
            .and_then(|raw| {
                serde_json::from_str(&raw)
                    .map_err(|e| EngineError::ModelLoadFailed(format!("parse config: {}", e)))
            })?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| EngineError::ModelLoadFailed(format!("tokenizer: {}", e)))?;
        let language_token = match language {
            Some(lang) => Some(token_id(&tokenizer, &format!("<|{}|>", lang))?),
            None => None,
        };

        let mel_bytes = std::fs::read(&mel_path)
            .map_err(|e| EngineError::ModelLoadFailed(format!("mel filters: {}", e)))?;
        let mel_filters = read_mel_filters(&mel_bytes, &config)?;

        // SAFETY: safetensors files are memory-mapped read-only
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], m::DTYPE, &device)
                .map_err(|e| EngineError::classify(format!("weights: {}", e), EngineError::ModelLoadFailed))?
        };
        let model = m::model::Whisper::load(&vb, config.clone())
            .map_err(|e| EngineError::classify(format!("model: {}", e), EngineError::ModelLoadFailed))?;

        tracing::info!(device = ?device, "Candle Whisper engine loaded");

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            shared: Arc::new(WhisperShared {
                tokenizer,
                config,
                device,
                mel_filters,
                language_token,
            }),
        })
    }
}

#[async_trait]
impl Transcriber for CandleWhisperEngine {
    async fn generate(
        &self,
        audio_path: &Path,
        options: &GenerateOptions,
    ) -> Result<Vec<RecognitionResult>, EngineError> {
        let path = audio_path.to_path_buf();
        let pcm = tokio::task::spawn_blocking(move || decode_file_to_pcm(&path))
            .await
            .map_err(|e| EngineError::DecodingFailed(format!("decode task: {}", e)))??;

        let total_ms = pcm.len() as u64 * 1000 / TARGET_SAMPLE_RATE as u64;
        let windows: Vec<Vec<f32>> = pcm.chunks(m::N_SAMPLES).map(<[f32]>::to_vec).collect();
        let windows_per_batch = (options.batch_size_s as usize / m::CHUNK_LENGTH).max(1);

        let mut sentences = Vec::with_capacity(windows.len());
        let mut offset = 0usize;

        // The model lock is released between batches so concurrent requests interleave.
        for batch in windows.chunks(windows_per_batch) {
            let guard = Arc::clone(&self.model).lock_owned().await;
            let shared = Arc::clone(&self.shared);
            let batch = batch.to_vec();

            let texts = tokio::task::spawn_blocking(move || {
                let mut model = guard;
                batch
                    .iter()
                    .map(|window| transcribe_window(&mut model, &shared, window))
                    .collect::<Result<Vec<String>, EngineError>>()
            })
            .await
            .map_err(|e| EngineError::InferenceFailed(format!("inference task: {}", e)))??;

            for text in texts {
                let start_ms = offset as u64 * WINDOW_MS;
                let end_ms = ((offset as u64 + 1) * WINDOW_MS).min(total_ms.max(start_ms));
                offset += 1;
                if !text.is_empty() {
                    sentences.push(SentenceInfo {
                        text,
                        start_ms,
                        end_ms,
                    });
                }
            }
        }

        let text = sentences
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        tracing::info!(
            windows = offset,
            chars = text.len(),
            "Audio transcription completed"
        );

        Ok(vec![RecognitionResult {
            text,
            sentence_info: options.sentence_timestamps.then_some(sentences),
        }])
    }
}

fn transcribe_window(
    model: &mut m::model::Whisper,
    shared: &WhisperShared,
    window: &[f32],
) -> Result<String, EngineError> {
    let mut samples = window.to_vec();
    samples.resize(m::N_SAMPLES, 0.0);

    let mel = m::audio::pcm_to_mel(&shared.config, &samples, &shared.mel_filters);
    let n_mel = shared.config.num_mel_bins;
    let n_frames = mel.len() / n_mel;
    let mel = Tensor::from_vec(mel, (1, n_mel, n_frames), &shared.device).map_err(inference)?;

    let text = decode_window(model, shared, &mel);
    model.reset_kv_cache();
    text
}

fn decode_window(
    model: &mut m::model::Whisper,
    shared: &WhisperShared,
    mel: &Tensor,
) -> Result<String, EngineError> {
    let tokenizer = &shared.tokenizer;
    let eot_token = token_id(tokenizer, m::EOT_TOKEN)?;

    let mut tokens = vec![token_id(tokenizer, m::SOT_TOKEN)?];
    if let Some(language) = shared.language_token {
        tokens.push(language);
    }
    tokens.push(token_id(tokenizer, m::TRANSCRIBE_TOKEN)?);
    tokens.push(token_id(tokenizer, m::NO_TIMESTAMPS_TOKEN)?);
    let prompt_len = tokens.len();

    let audio_features = model.encoder.forward(mel, true).map_err(inference)?;

    for step in 0..MAX_DECODE_TOKENS {
        let token_tensor = Tensor::new(tokens.as_slice(), &shared.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(inference)?;

        let hidden = model
            .decoder
            .forward(&token_tensor, &audio_features, step == 0)
            .map_err(inference)?;
        let logits = hidden
            .squeeze(0)
            .and_then(|h| model.decoder.final_linear(&h))
            .map_err(inference)?;

        let seq_len = logits.dim(0).map_err(inference)?;
        let next_token = logits
            .get(seq_len - 1)
            .and_then(|last| last.argmax(0))
            .and_then(|t| t.to_scalar::<u32>())
            .map_err(inference)?;

        if next_token == eot_token {
            break;
        }
        tokens.push(next_token);
    }

    let text = tokenizer
        .decode(&tokens[prompt_len..], true)
        .map_err(|e| EngineError::InferenceFailed(format!("detokenize: {}", e)))?;

    Ok(text.trim().to_string())
}

fn inference(e: candle_core::Error) -> EngineError {
    EngineError::classify(e.to_string(), EngineError::InferenceFailed)
}

fn token_id(tokenizer: &Tokenizer, token: &str) -> Result<u32, EngineError> {
    tokenizer
        .token_to_id(token)
        .ok_or_else(|| EngineError::ModelLoadFailed(format!("token not found: {}", token)))
}

fn read_mel_filters(bytes: &[u8], config: &Config) -> Result<Vec<f32>, EngineError> {
    let expected_len = config.num_mel_bins * (m::N_FFT / 2 + 1);
    if bytes.len() < expected_len * 4 {
        return Err(EngineError::ModelLoadFailed(format!(
            "mel filters file too small: {} bytes, expected at least {}",
            bytes.len(),
            expected_len * 4
        )));
    }

    Ok(bytes
        .chunks_exact(4)
        .take(expected_len)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}
