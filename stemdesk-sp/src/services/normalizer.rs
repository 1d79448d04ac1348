//! RMS loudness normalization
//!
//! Level is measured in dBFS against full scale (`20·log10(rms)`), the gain needed to
//! reach the target is applied uniformly, and the result is written next to the input
//! under a `_normalized` suffix. The input is never modified.

use crate::models::{AudioAsset, NormalizedArtifact};
use crate::services::artifact_store::normalized_file_name;
use crate::services::audio_io::{load_native, write_wav, AudioIoError, SampleEncoding};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default loudness target
pub const DEFAULT_TARGET_DBFS: f64 = -20.0;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error(transparent)]
    Audio(#[from] AudioIoError),

    #[error("Invalid artifact name: {0}")]
    InvalidName(String),
}

/// RMS level in dBFS, `-inf` for silence
pub fn measure_dbfs(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return f64::NEG_INFINITY;
    }
    let sum_squares: f64 = samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
    let rms = (sum_squares / samples.len() as f64).sqrt();
    if rms == 0.0 {
        f64::NEG_INFINITY
    } else {
        20.0 * rms.log10()
    }
}

/// Linear factor for a gain in dB
pub fn gain_factor(gain_db: f64) -> f64 {
    10f64.powf(gain_db / 20.0)
}

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    target_dbfs: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(DEFAULT_TARGET_DBFS)
    }
}

impl Normalizer {
    pub fn new(target_dbfs: f64) -> Self {
        Self { target_dbfs }
    }

    pub fn target_dbfs(&self) -> f64 {
        self.target_dbfs
    }

    /// Apply the target gain to an in-memory asset, returning (asset, measured, gain)
    pub fn apply(&self, asset: AudioAsset) -> (AudioAsset, f64, f64) {
        let measured = measure_dbfs(&asset.samples);
        if !measured.is_finite() {
            return (asset, measured, 0.0);
        }

        let gain_db = self.target_dbfs - measured;
        let factor = gain_factor(gain_db) as f32;
        let samples = asset.samples.iter().map(|&s| s * factor).collect();
        (
            AudioAsset::new(samples, asset.sample_rate, asset.channels),
            measured,
            gain_db,
        )
    }

    /// Normalize `input` into `<stem>_normalized.wav` beside it
    pub fn normalize(&self, input: &Path) -> Result<NormalizedArtifact, NormalizeError> {
        let name = input
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| NormalizeError::InvalidName(input.display().to_string()))?;
        let output = input.with_file_name(normalized_file_name(name));

        let asset = load_native(input)?;
        let (normalized, measured_dbfs, gain_db) = self.apply(asset);

        if !measured_dbfs.is_finite() {
            warn!("{} is silent, writing it unchanged", input.display());
        }

        let clipped = normalized.samples.iter().filter(|s| s.abs() > 1.0).count();
        if clipped > 0 {
            debug!(clipped, "Clipping samples after gain in {}", input.display());
        }

        write_wav(&output, &normalized, SampleEncoding::Pcm16)?;

        info!(
            measured_dbfs,
            gain_db,
            target_dbfs = self.target_dbfs,
            "Normalized {}",
            output.display()
        );

        Ok(NormalizedArtifact {
            path: output,
            source: input.to_path_buf(),
            measured_dbfs,
            gain_db,
        })
    }
}
