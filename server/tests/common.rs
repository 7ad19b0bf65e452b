//! Common utilities for integration tests

use std::sync::{Arc, Mutex};

use axum::Router;
use server::{build_router, AppState};
use tts_core::{Device, Segment, SpeechGenerator, Waveform};

pub const STUB_SAMPLE_RATE: u32 = 24_000;

/// Arguments a generator was called with.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub text: String,
    pub speaker: i64,
    pub context_len: usize,
    pub max_audio_length_ms: u64,
}

/// Returns a short tone and records every call.
#[derive(Default)]
pub struct RecordingGenerator {
    pub calls: Mutex<Vec<Call>>,
}

impl RecordingGenerator {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl SpeechGenerator for RecordingGenerator {
    fn sample_rate(&self) -> u32 {
        STUB_SAMPLE_RATE
    }

    fn generate(
        &self,
        text: &str,
        speaker: i64,
        context: &[Segment],
        max_audio_length_ms: u64,
    ) -> anyhow::Result<Waveform> {
        self.calls.lock().unwrap().push(Call {
            text: text.to_string(),
            speaker,
            context_len: context.len(),
            max_audio_length_ms,
        });

        // 200ms of 440Hz
        let samples = (0..STUB_SAMPLE_RATE / 5)
            .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / STUB_SAMPLE_RATE as f32).sin() * 0.5)
            .collect();
        Ok(Waveform::new(samples, STUB_SAMPLE_RATE))
    }
}

/// Fails every call, like a model rejecting its input.
pub struct FailingGenerator;

impl SpeechGenerator for FailingGenerator {
    fn sample_rate(&self) -> u32 {
        STUB_SAMPLE_RATE
    }

    fn generate(&self, _: &str, _: i64, _: &[Segment], _: u64) -> anyhow::Result<Waveform> {
        Err(anyhow::anyhow!("backend exhausted: out of memory"))
    }
}

/// Create a test app backed by `generator`.
pub fn create_test_app(generator: Arc<dyn SpeechGenerator>) -> Router {
    build_router(AppState::new(generator, Device::Cpu))
}

/// Create a test app with a fresh recording generator.
pub fn create_recording_app() -> (Router, Arc<RecordingGenerator>) {
    let generator = Arc::new(RecordingGenerator::default());
    (create_test_app(generator.clone()), generator)
}
