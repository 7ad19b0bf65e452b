use std::{
    fs,
    path::Path,
    sync::{Arc, Mutex},
    time::Instant,
};

use anyhow::Context;
use piper_rs::synth::{PiperSpeechStreamParallel, PiperSpeechSynthesizer};
use piper_rs::PiperModel;
use tracing::{debug, info};

use crate::{Device, ModelFiles, Segment, SpeechGenerator, Waveform};

/// Fields of a Piper voice config this crate needs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct VoiceConfig {
    sample_rate: u32,
    num_speakers: u32,
}

impl VoiceConfig {
    fn read<P: AsRef<Path>>(cfg_path: P) -> anyhow::Result<Self> {
        let text = fs::read_to_string(cfg_path.as_ref()).with_context(|| {
            format!("Failed to read config file: {}", cfg_path.as_ref().display())
        })?;
        Self::parse(&text)
    }

    fn parse(text: &str) -> anyhow::Result<Self> {
        let json: serde_json::Value =
            serde_json::from_str(text).with_context(|| "Config file is not valid JSON")?;

        let sample_rate = json
            .get("audio")
            .and_then(|a| a.get("sample_rate"))
            .and_then(|sr| sr.as_u64())
            .ok_or_else(|| anyhow::anyhow!("Missing or invalid 'audio.sample_rate' in config"))?;
        let num_speakers = json
            .get("num_speakers")
            .and_then(|n| n.as_u64())
            .unwrap_or(1);

        Ok(Self {
            sample_rate: sample_rate as u32,
            num_speakers: num_speakers as u32,
        })
    }
}

struct Loaded {
    model: Arc<dyn PiperModel + Send + Sync>,
    synth: PiperSpeechSynthesizer,
}

/// Speech generator backed by a Piper (VITS/ONNX) voice.
pub struct PiperGenerator {
    // Speaker selection is model-global state, so selection and synthesis
    // happen under one lock.
    inner: Mutex<Loaded>,
    config: VoiceConfig,
    device: Device,
}

impl std::fmt::Debug for PiperGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PiperGenerator")
            .field("synth", &"<PiperSpeechSynthesizer>")
            .field("sample_rate", &self.config.sample_rate)
            .field("num_speakers", &self.config.num_speakers)
            .field("device", &self.device)
            .finish()
    }
}

impl PiperGenerator {
    /// Load a voice onto `device`. Slow; call once at startup.
    pub fn load(files: &ModelFiles, device: Device) -> anyhow::Result<Self> {
        let started = Instant::now();
        let config = VoiceConfig::read(&files.config)?;

        device
            .register()
            .with_context(|| format!("Failed to bind model to {device}"))?;

        let model = piper_rs::from_config_path(&files.config)
            .map_err(|e| anyhow::anyhow!("piper load error: {e}"))?;
        let synth = PiperSpeechSynthesizer::new(model.clone())
            .map_err(|e| anyhow::anyhow!("piper synthesizer error: {e}"))?;

        info!(
            "Loaded voice {} on {device} ({} Hz, {} speaker(s)) in {:.2}s",
            files.config.display(),
            config.sample_rate,
            config.num_speakers,
            started.elapsed().as_secs_f64()
        );

        Ok(Self {
            inner: Mutex::new(Loaded { model, synth }),
            config,
            device,
        })
    }

    pub fn device(&self) -> Device {
        self.device
    }
}

/// Only multi-speaker voices take a speaker id; single-speaker voices accept
/// any id and ignore it.
fn should_set_speaker(num_speakers: u32) -> bool {
    num_speakers > 1
}

impl SpeechGenerator for PiperGenerator {
    fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    fn generate(
        &self,
        text: &str,
        speaker: i64,
        context: &[Segment],
        max_audio_length_ms: u64,
    ) -> anyhow::Result<Waveform> {
        if !context.is_empty() {
            debug!("Piper voices do not use context; ignoring {} segment(s)", context.len());
        }

        let loaded = self.inner.lock().map_err(|_| {
            anyhow::anyhow!("Synthesizer lock poisoned - this indicates a previous panic. Please restart the server.")
        })?;

        if should_set_speaker(self.config.num_speakers) {
            if let Some(e) = loaded.model.set_speaker(speaker) {
                return Err(anyhow::anyhow!("speaker {speaker} rejected: {e}"));
            }
        } else if speaker != 0 {
            debug!("Single-speaker voice; ignoring speaker {speaker}");
        }

        let iter: PiperSpeechStreamParallel = loaded
            .synth
            .synthesize_parallel(text.to_string(), None)
            .map_err(|e| anyhow::anyhow!("piper synth error: {e}"))?;

        let mut samples: Vec<f32> = Vec::new();
        for part in iter {
            samples.extend(
                part.map_err(|e| anyhow::anyhow!("chunk error: {e}"))?
                    .into_vec(),
            );
        }

        let mut waveform = Waveform::new(samples, self.config.sample_rate);
        waveform.truncate_ms(max_audio_length_ms);
        Ok(waveform)
    }
}
