//! Per-component concatenation of separated chunk streams

use crate::models::{AudioAsset, ComponentLabel, MergedArtifact};
use crate::services::audio_io::{read_wav, write_wav, SampleEncoding};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("No chunks survived separation for {0}")]
    EmptyInput(ComponentLabel),

    #[error("Cannot read {path} for {label}: {reason}")]
    Decode {
        label: ComponentLabel,
        path: String,
        reason: String,
    },

    #[error("Chunk {path} has {found} channel(s) at {found_rate} Hz, expected {channels} at {rate} Hz")]
    LayoutMismatch {
        path: String,
        found: u16,
        found_rate: u32,
        channels: u16,
        rate: u32,
    },

    #[error("Cannot write merged {label}: {reason}")]
    Write { label: ComponentLabel, reason: String },
}

/// Concatenate waveforms sample-for-sample, with no padding or crossfade
///
/// Every part must share the first part's rate and channel count.
pub fn concat(parts: &[AudioAsset]) -> Option<AudioAsset> {
    let first = parts.first()?;
    let total: usize = parts.iter().map(|p| p.samples.len()).sum();
    let mut samples = Vec::with_capacity(total);
    for part in parts {
        samples.extend_from_slice(&part.samples);
    }
    Some(AudioAsset::new(samples, first.sample_rate, first.channels))
}

/// Concatenate one component's chunk files into `output`
///
/// Source files are deleted only after the merged file is durably in place; a failed
/// delete is logged and never masks the successful write.
pub fn merge(
    label: ComponentLabel,
    sources: &[PathBuf],
    chunk_indices: &[usize],
    output: &Path,
) -> Result<MergedArtifact, MergeError> {
    if sources.is_empty() {
        return Err(MergeError::EmptyInput(label));
    }

    let mut parts: Vec<AudioAsset> = Vec::with_capacity(sources.len());
    for path in sources {
        let part = read_wav(path).map_err(|e| MergeError::Decode {
            label,
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        if let Some(first) = parts.first() {
            if part.channels != first.channels || part.sample_rate != first.sample_rate {
                return Err(MergeError::LayoutMismatch {
                    path: path.display().to_string(),
                    found: part.channels,
                    found_rate: part.sample_rate,
                    channels: first.channels,
                    rate: first.sample_rate,
                });
            }
        }
        parts.push(part);
    }

    let merged = concat(&parts).ok_or(MergeError::EmptyInput(label))?;
    drop(parts);

    write_wav(output, &merged, SampleEncoding::Float32).map_err(|e| MergeError::Write {
        label,
        reason: e.to_string(),
    })?;

    for path in sources {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(component = %label, "Failed to delete consumed chunk {}: {}", path.display(), e);
        } else {
            debug!(component = %label, "Deleted consumed chunk {}", path.display());
        }
    }

    info!(
        component = %label,
        chunks = sources.len(),
        frames = merged.frames(),
        "Merged {}",
        output.display()
    );

    Ok(MergedArtifact {
        label,
        path: output.to_path_buf(),
        frames: merged.frames(),
        sample_rate: merged.sample_rate,
        chunk_indices: chunk_indices.to_vec(),
    })
}

/// Delete chunk files that will not be merged
///
/// Covers the cut segment files once routing is done and the stems of a component
/// whose merge failed. Missing files are ignored.
pub fn release_chunks<'a>(paths: impl IntoIterator<Item = &'a Path>) -> usize {
    let mut removed = 0;
    for path in paths.into_iter().filter(|p| p.is_file()) {
        match std::fs::remove_file(path) {
            Ok(()) => {
                debug!("Released chunk {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("Failed to delete chunk {}: {}", path.display(), e),
        }
    }
    removed
}
