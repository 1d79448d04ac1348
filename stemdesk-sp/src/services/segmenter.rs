//! Fixed-duration chunking of the decoded upload

use crate::models::{AudioAsset, Segment};
use crate::services::artifact_store::chunk_file_name;
use crate::services::audio_io::{write_wav, SampleEncoding};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("Segment duration must be positive, got {0}")]
    InvalidDuration(f64),

    #[error("Source audio is empty")]
    EmptySource,

    #[error("No segments could be written")]
    NoSegments,
}

/// Result of cutting one signal into chunks
#[derive(Debug, Clone)]
pub struct Segmentation {
    /// Persisted chunks in index order (failed writes are absent)
    pub segments: Vec<Segment>,
    pub sample_rate: u32,
    pub total_frames: usize,
    /// Chunk indices whose file could not be written
    pub failed_writes: Vec<usize>,
}

/// Cuts a mono signal into contiguous windows of `segment_seconds`
///
/// Window `i` covers frames `[i*step, i*step + step)`; the final window may be shorter.
#[derive(Debug, Clone)]
pub struct Segmenter {
    sample_rate: u32,
    step: usize,
}

impl Segmenter {
    pub fn new(sample_rate: u32, segment_seconds: f64) -> Result<Self, SegmentError> {
        if !(segment_seconds.is_finite() && segment_seconds > 0.0) {
            return Err(SegmentError::InvalidDuration(segment_seconds));
        }
        let step = ((segment_seconds * sample_rate as f64).round() as usize).max(1);
        Ok(Self { sample_rate, step })
    }

    /// Frames per full window
    pub fn step_frames(&self) -> usize {
        self.step
    }

    /// Window boundaries without touching disk
    pub fn windows<'a>(&self, samples: &'a [f32]) -> impl Iterator<Item = (usize, &'a [f32])> {
        samples.chunks(self.step).enumerate()
    }

    /// Persist each window as `temp_chunk_<i>.wav` under `dir`
    ///
    /// The asset must already be mono at this segmenter's rate. A window that fails to
    /// write is logged and skipped; only zero written segments is an error.
    pub fn segment(&self, asset: &AudioAsset, source: &Path, dir: &Path) -> Result<Segmentation, SegmentError> {
        if asset.is_empty() {
            return Err(SegmentError::EmptySource);
        }

        let mut segments = Vec::new();
        let mut failed_writes = Vec::new();

        for (index, window) in self.windows(&asset.samples) {
            let path = dir.join(chunk_file_name(index));
            let chunk = AudioAsset::mono(window.to_vec(), self.sample_rate);

            match write_wav(&path, &chunk, SampleEncoding::Float32) {
                Ok(()) => {
                    debug!(chunk = index, frames = window.len(), "Wrote chunk");
                    segments.push(Segment {
                        index,
                        path,
                        frames: window.len(),
                        sample_rate: self.sample_rate,
                        source: source.to_path_buf(),
                    });
                }
                Err(e) => {
                    warn!(chunk = index, "Failed to write chunk: {}", e);
                    failed_writes.push(index);
                }
            }
        }

        if segments.is_empty() {
            return Err(SegmentError::NoSegments);
        }

        info!(
            chunks = segments.len(),
            failed = failed_writes.len(),
            step_frames = self.step,
            "Segmented {}",
            source.display()
        );

        Ok(Segmentation {
            segments,
            sample_rate: self.sample_rate,
            total_frames: asset.frames(),
            failed_writes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::audio_io::read_wav;
    use tempfile::TempDir;

    #[test]
    fn test_rejects_non_positive_duration() {
        assert!(Segmenter::new(8000, 0.0).is_err());
        assert!(Segmenter::new(8000, -1.0).is_err());
        assert!(Segmenter::new(8000, f64::NAN).is_err());
    }

    #[test]
    fn test_windows_cover_signal_exactly_once() {
        let segmenter = Segmenter::new(10, 0.7).unwrap();
        for len in [0usize, 1, 6, 7, 8, 20, 21, 99] {
            let samples: Vec<f32> = (0..len).map(|i| i as f32).collect();
            let rebuilt: Vec<f32> = segmenter
                .windows(&samples)
                .flat_map(|(_, w)| w.iter().copied())
                .collect();
            assert_eq!(rebuilt, samples, "length {}", len);
        }
    }

    #[test]
    fn test_tail_window_is_short_not_padded() {
        let segmenter = Segmenter::new(10, 1.0).unwrap();
        let samples = vec![0.0f32; 95];
        let lengths: Vec<usize> = segmenter.windows(&samples).map(|(_, w)| w.len()).collect();

        assert_eq!(lengths.len(), 10);
        assert!(lengths[..9].iter().all(|&l| l == 10));
        assert_eq!(lengths[9], 5);
    }

    #[test]
    fn test_segment_persists_indexed_chunks() {
        let temp = TempDir::new().unwrap();
        let samples: Vec<f32> = (0..25).map(|i| i as f32 / 100.0).collect();
        let asset = AudioAsset::mono(samples.clone(), 10);

        let result = Segmenter::new(10, 1.0)
            .unwrap()
            .segment(&asset, Path::new("song.wav"), temp.path())
            .unwrap();

        assert_eq!(result.segments.len(), 3);
        assert_eq!(result.total_frames, 25);
        assert!(result.failed_writes.is_empty());

        let mut rebuilt = Vec::new();
        for (i, segment) in result.segments.iter().enumerate() {
            assert_eq!(segment.index, i);
            assert_eq!(segment.path, temp.path().join(format!("temp_chunk_{}.wav", i)));
            rebuilt.extend(read_wav(&segment.path).unwrap().samples);
        }
        assert_eq!(rebuilt, samples);
    }

    #[test]
    fn test_unwritable_directory_yields_no_segments() {
        let temp = TempDir::new().unwrap();
        let missing_dir = temp.path().join("gone");
        let asset = AudioAsset::mono(vec![0.0; 30], 10);

        let err = Segmenter::new(10, 1.0)
            .unwrap()
            .segment(&asset, Path::new("song.wav"), &missing_dir)
            .unwrap_err();
        assert!(matches!(err, SegmentError::NoSegments));
    }

    #[test]
    fn test_empty_source_rejected() {
        let temp = TempDir::new().unwrap();
        let err = Segmenter::new(10, 1.0)
            .unwrap()
            .segment(&AudioAsset::mono(vec![], 10), Path::new("x.wav"), temp.path())
            .unwrap_err();
        assert!(matches!(err, SegmentError::EmptySource));
    }
}
