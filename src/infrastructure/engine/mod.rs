mod audio_decoder;
mod candle_whisper_engine;
mod candle_whisper_loader;

pub use audio_decoder::{TARGET_SAMPLE_RATE, decode_file_to_pcm};
pub use candle_whisper_engine::CandleWhisperEngine;
pub use candle_whisper_loader::CandleWhisperLoader;
