mod wav;
pub mod device;
pub mod hub;
pub mod piper;

pub use device::{Device, DeviceError, DevicePreference};
pub use hub::{ModelFiles, ModelSource};
pub use piper::PiperGenerator;
pub use wav::{encode_wav, encode_wav_base64};

/// Upper bound on generated audio used by the HTTP service.
pub const DEFAULT_MAX_AUDIO_LENGTH_MS: u64 = 10_000;

/// Mono PCM audio as produced by a generator.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }

    /// Drop everything past `max_ms` milliseconds.
    pub fn truncate_ms(&mut self, max_ms: u64) {
        let max_samples = (max_ms * self.sample_rate as u64 / 1000) as usize;
        self.samples.truncate(max_samples);
    }
}

/// A previously spoken utterance that a generator may condition on.
#[derive(Debug, Clone)]
pub struct Segment {
    pub speaker: i64,
    pub text: String,
    pub audio: Waveform,
}

/// A loaded text-to-speech model.
///
/// Implementations are shared across requests behind an `Arc` and called from
/// tokio's blocking pool, so `generate` is free to block for the whole
/// synthesis.
pub trait SpeechGenerator: Send + Sync {
    /// Rate of every waveform this generator returns.
    fn sample_rate(&self) -> u32;

    fn generate(
        &self,
        text: &str,
        speaker: i64,
        context: &[Segment],
        max_audio_length_ms: u64,
    ) -> anyhow::Result<Waveform>;
}
