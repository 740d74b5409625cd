use std::path::PathBuf;

use tempfile::TempDir;

use subgen::application::ports::EngineError;
use subgen::infrastructure::engine::{TARGET_SAMPLE_RATE, decode_file_to_pcm};

fn build_wav(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
    let data_size = (samples.len() * 2) as u32;
    let block_align = channels * 2;
    let byte_rate = sample_rate * block_align as u32;

    let mut wav = Vec::with_capacity(44 + data_size as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_size).to_le_bytes());
    wav.extend_from_slice(b"WAVE");
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
    wav.extend_from_slice(&channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_size.to_le_bytes());
    for &s in samples {
        wav.extend_from_slice(&s.to_le_bytes());
    }
    wav
}

fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn given_16khz_mono_wav_when_decoding_then_returns_same_number_of_samples() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "tone.wav", &build_wav(TARGET_SAMPLE_RATE, 1, &vec![1000i16; 1600]));

    let pcm = decode_file_to_pcm(&path).unwrap();

    assert_eq!(pcm.len(), 1600);
    assert!(pcm.iter().all(|s| (*s - 1000.0 / 32768.0).abs() < 1e-3));
}

#[test]
fn given_stereo_wav_when_decoding_then_channels_are_averaged() {
    let dir = TempDir::new().unwrap();
    let interleaved: Vec<i16> = (0..800).flat_map(|_| [2000i16, 0i16]).collect();
    let path = write_file(&dir, "stereo.wav", &build_wav(TARGET_SAMPLE_RATE, 2, &interleaved));

    let pcm = decode_file_to_pcm(&path).unwrap();

    assert_eq!(pcm.len(), 800);
    assert!(pcm.iter().all(|s| (*s - 1000.0 / 32768.0).abs() < 1e-3));
}

#[test]
fn given_8khz_wav_when_decoding_then_resampled_to_16khz() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "low.wav", &build_wav(8_000, 1, &vec![0i16; 8_000]));

    let pcm = decode_file_to_pcm(&path).unwrap();

    let expected = TARGET_SAMPLE_RATE as i64;
    assert!((pcm.len() as i64 - expected).abs() <= 64, "got {} samples", pcm.len());
}

#[test]
fn given_non_audio_file_when_decoding_then_decoding_error() {
    let dir = TempDir::new().unwrap();
    let path = write_file(&dir, "notes.txt", b"definitely not audio");

    let result = decode_file_to_pcm(&path);

    assert!(matches!(result, Err(EngineError::DecodingFailed(_))));
}

#[test]
fn given_missing_file_when_decoding_then_decoding_error() {
    let result = decode_file_to_pcm(std::path::Path::new("/nonexistent/clip.wav"));

    assert!(matches!(result, Err(EngineError::DecodingFailed(_))));
}
