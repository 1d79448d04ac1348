//! Shared fixtures for integration tests
//!
//! WAV generation with hound plus in-process fakes for the three model collaborators.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use stemdesk_sp::collaborators::{
    Collaborators, DiarizationService, EnhancementModel, ModelError, PassthroughEnhancement, SeparationModel,
};
use stemdesk_sp::config::{AccessToken, CredentialSource, ServiceConfig};
use stemdesk_sp::models::{AudioAsset, ComponentLabel, SpeakerTurn};
use stemdesk_sp::services::audio_io::{read_wav, write_wav, SampleEncoding};
use stemdesk_sp::AppState;

pub const RATE: u32 = 8_000;

/// Value of sample `i` in a [`ramp`]: distinct per second, increasing within it
pub fn ramp_value(i: usize) -> f32 {
    let second = (i / RATE as usize) as f32;
    let within = (i % RATE as usize) as f32 / RATE as f32;
    0.005 * second + 0.004 * within
}

/// `seconds` of mono audio whose every second is distinguishable
pub fn ramp(seconds: f64) -> Vec<f32> {
    let frames = (seconds * RATE as f64).round() as usize;
    (0..frames).map(ramp_value).collect()
}

/// Write mono float samples as a 32-bit float WAV
pub fn write_float_wav(path: &Path, samples: &[f32], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &sample in samples {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
}

/// Write a 440 Hz tone as 16-bit PCM
pub fn write_tone_wav(path: &Path, seconds: f64, amplitude: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let frames = (seconds * RATE as f64) as usize;
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..frames {
        let t = i as f32 / RATE as f32;
        let sample = amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin();
        writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

/// Chunk index from `temp_chunk_<i>.wav`
pub fn chunk_index(path: &Path) -> usize {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.rsplit('_').next())
        .and_then(|s| s.parse().ok())
        .unwrap()
}

/// Separation that copies each chunk into every stem
///
/// Chunks listed in `fail` return an error; the `silent` component is written as zeros.
#[derive(Default)]
pub struct CopySeparation {
    pub fail: Vec<usize>,
    pub silent: Option<ComponentLabel>,
    pub calls: Mutex<Vec<usize>>,
}

impl CopySeparation {
    pub fn failing(fail: Vec<usize>) -> Self {
        Self {
            fail,
            ..Self::default()
        }
    }
}

#[async_trait]
impl SeparationModel for CopySeparation {
    async fn separate(&self, chunk: &Path) -> Result<HashMap<ComponentLabel, PathBuf>, ModelError> {
        let index = chunk_index(chunk);
        self.calls.lock().unwrap().push(index);
        if self.fail.contains(&index) {
            return Err(ModelError::Execution(format!("chunk {} rejected", index)));
        }

        let asset = read_wav(chunk).map_err(|e| ModelError::Audio(e.to_string()))?;
        let mut stems = HashMap::new();
        for label in ComponentLabel::ALL {
            let stem = if self.silent == Some(label) {
                AudioAsset::new(vec![0.0; asset.samples.len()], asset.sample_rate, asset.channels)
            } else {
                asset.clone()
            };
            let path = chunk.with_file_name(format!("temp_chunk_{}_{}.wav", index, label));
            write_wav(&path, &stem, SampleEncoding::Float32).map_err(|e| ModelError::Audio(e.to_string()))?;
            stems.insert(label, path);
        }
        Ok(stems)
    }
}

/// Stereo enhancer that refuses silent input
pub struct RejectSilence;

#[async_trait]
impl EnhancementModel for RejectSilence {
    fn input_channels(&self) -> u16 {
        2
    }

    async fn enhance(&self, input: AudioAsset) -> Result<AudioAsset, ModelError> {
        if input.samples.iter().all(|s| *s == 0.0) {
            return Err(ModelError::Execution("silent input".to_string()));
        }
        Ok(input)
    }
}

/// Diarizer returning a fixed list of turns and recording the token it saw
#[derive(Default)]
pub struct ScriptedDiarizer {
    pub turns: Vec<SpeakerTurn>,
    pub seen_token: Mutex<Option<String>>,
}

impl ScriptedDiarizer {
    pub fn new(turns: Vec<SpeakerTurn>) -> Self {
        Self {
            turns,
            seen_token: Mutex::new(None),
        }
    }
}

#[async_trait]
impl DiarizationService for ScriptedDiarizer {
    async fn diarize(&self, audio: &Path, token: &AccessToken) -> Result<Vec<SpeakerTurn>, ModelError> {
        if !audio.exists() {
            return Err(ModelError::FileNotFound(audio.display().to_string()));
        }
        *self.seen_token.lock().unwrap() = Some(token.expose().to_string());
        Ok(self.turns.clone())
    }
}

/// Config rooted at `workspace` with small test segments
pub fn test_config(workspace: &Path, segment_seconds: f64) -> ServiceConfig {
    let mut config = ServiceConfig::for_workspace(workspace.to_path_buf());
    config.sample_rate = RATE;
    config.segment_seconds = segment_seconds;
    config.credential = CredentialSource::new(Some("hf_test_token_0123".to_string()));
    config
}

pub fn collaborators(
    separation: Arc<dyn SeparationModel>,
    enhancement: Option<Arc<dyn EnhancementModel>>,
    diarization: Arc<dyn DiarizationService>,
) -> Collaborators {
    Collaborators {
        separation,
        enhancement: enhancement.unwrap_or_else(|| Arc::new(PassthroughEnhancement)),
        diarization,
    }
}

/// App state over a temp workspace with copy separation and scripted diarization
pub fn app_state(workspace: &Path, diarizer: Arc<ScriptedDiarizer>) -> AppState {
    let config = test_config(workspace, 1.0);
    let collaborators = collaborators(Arc::new(CopySeparation::default()), None, diarizer);
    AppState::new(config, collaborators).unwrap()
}
