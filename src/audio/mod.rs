//! Audio Synthesizer Pool (C5): per-persona engine instances, phrase → WAV
//! with recorded duration (spec §4.5).

pub mod placeholder;
pub mod pool;
pub mod voicevox;

pub use placeholder::PlaceholderSynthesizer;
pub use pool::SynthesizerPool;
pub use voicevox::VoicevoxSynthesizer;

use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// One phrase queued for synthesis.
#[derive(Debug, Clone)]
pub struct SynthesisRequest<'a> {
    pub original_index: usize,
    /// Pronunciation-driving text. Callers pass `phrase.reading` when
    /// non-empty (P8); otherwise the dictionary-backed `text` is used.
    pub reading_or_text: &'a str,
    pub speaker_id: u32,
    pub speed_scale: f32,
}

/// Abstract voice engine. One instance per distinct persona engine config.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Open dictionaries/voice models. Fails loudly if engine assets are
    /// absent unless the caller has opted into placeholder mode.
    async fn initialize(&mut self) -> Result<()>;

    /// Synthesize one phrase to `output_path`, returning its duration in seconds.
    async fn synthesize_phrase(
        &self,
        request: &SynthesisRequest<'_>,
        output_path: &Path,
    ) -> Result<f64>;

    fn engine_name(&self) -> &'static str;
}

/// Read back a WAV file's duration in seconds, used both for cache reuse and
/// for placeholder-mode probing.
pub fn wav_duration_seconds(path: &Path) -> Result<f64> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| crate::error::VideoGenError::AudioGeneration(format!("{}: {e}", path.display())))?;
    let spec = reader.spec();
    let frames = reader.duration() as f64;
    Ok(frames / spec.sample_rate as f64)
}

/// Write a silent WAV of `duration_seconds` at 24kHz mono, used by
/// `PlaceholderSynthesizer` and tests.
pub fn write_silent_wav(path: &Path, duration_seconds: f64) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 24_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| crate::error::VideoGenError::AudioGeneration(e.to_string()))?;
    let sample_count = (duration_seconds * spec.sample_rate as f64) as usize;
    for _ in 0..sample_count {
        writer
            .write_sample(0i16)
            .map_err(|e| crate::error::VideoGenError::AudioGeneration(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| crate::error::VideoGenError::AudioGeneration(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_and_read_back_silent_wav_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phrase_0000.wav");
        write_silent_wav(&path, 1.5).unwrap();
        let duration = wav_duration_seconds(&path).unwrap();
        assert!((duration - 1.5).abs() < 0.01);
    }
}
