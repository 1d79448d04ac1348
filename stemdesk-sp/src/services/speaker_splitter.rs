//! Diarization-driven speaker track extraction

use crate::collaborators::{DiarizationService, ModelError};
use crate::config::{CredentialError, CredentialSource};
use crate::models::{AudioAsset, IntervalOrdering, SpeakerKey, SpeakerTrack, SpeakerTurn};
use crate::services::artifact_store::{clear_speaker_files_in, StoreError};
use crate::services::audio_io::{load_native, write_wav, AudioIoError, SampleEncoding};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SpeakerSplitError {
    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error("Vocal file not found: {0}")]
    VocalNotFound(String),

    #[error("Vocal file is empty: {0}")]
    VocalEmpty(String),

    #[error("Vocal file is not valid audio: {0}")]
    VocalMalformed(String),

    #[error("Diarization failed: {0}")]
    Diarization(#[source] ModelError),

    #[error("Cannot write speaker track: {0}")]
    Write(#[source] AudioIoError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Blocking task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Group turns by speaker key, in order of each speaker's first appearance
///
/// Turns with unusable labels or non-finite/empty intervals are dropped.
pub fn group_turns(turns: &[SpeakerTurn], ordering: IntervalOrdering) -> Vec<(SpeakerKey, Vec<(f64, f64)>)> {
    let mut groups: Vec<(SpeakerKey, Vec<(f64, f64)>)> = Vec::new();

    for turn in turns {
        if !(turn.start.is_finite() && turn.end.is_finite()) || turn.end <= turn.start {
            warn!(speaker = %turn.speaker, start = turn.start, end = turn.end, "Dropping invalid interval");
            continue;
        }
        let key = match SpeakerKey::from_label(&turn.speaker) {
            Ok(key) => key,
            Err(e) => {
                warn!("{}", e);
                continue;
            }
        };

        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, intervals)) => intervals.push((turn.start, turn.end)),
            None => groups.push((key, vec![(turn.start, turn.end)])),
        }
    }

    if ordering == IntervalOrdering::ByStart {
        for (_, intervals) in groups.iter_mut() {
            intervals.sort_by(|a, b| a.0.total_cmp(&b.0));
        }
    }

    groups
}

/// Concatenate the frames covered by `intervals`, clamped to the signal
pub fn extract_intervals(asset: &AudioAsset, intervals: &[(f64, f64)]) -> AudioAsset {
    let rate = asset.sample_rate as f64;
    let mut samples = Vec::new();

    for &(start, end) in intervals {
        let first = (start.max(0.0) * rate).round() as usize;
        let last = (end.max(0.0) * rate).round() as usize;
        samples.extend_from_slice(asset.frame_slice(first, last));
    }

    AudioAsset::new(samples, asset.sample_rate, asset.channels)
}

/// Splits the denoised vocal track into one file per speaker
pub struct SpeakerSplitter {
    diarization: Arc<dyn DiarizationService>,
    credential: CredentialSource,
    ordering: IntervalOrdering,
    timeout: Duration,
}

impl SpeakerSplitter {
    pub fn new(
        diarization: Arc<dyn DiarizationService>,
        credential: CredentialSource,
        ordering: IntervalOrdering,
        timeout: Duration,
    ) -> Self {
        Self {
            diarization,
            credential,
            ordering,
            timeout,
        }
    }

    /// Diarize `vocal` and write `speaker_<label>.wav` files into `speakers_dir`
    ///
    /// The credential is checked before any audio is touched, then the vocal file is
    /// validated (missing, empty, undecodable each fail distinctly). Previous speaker files
    /// are cleared before diarization. An empty map means no speakers were detected.
    pub async fn split(
        &self,
        vocal: &Path,
        speakers_dir: &Path,
    ) -> Result<BTreeMap<SpeakerKey, SpeakerTrack>, SpeakerSplitError> {
        let token = self.credential.resolve()?;

        let name = vocal.display().to_string();
        let metadata = match tokio::fs::metadata(vocal).await {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(SpeakerSplitError::VocalNotFound(name)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SpeakerSplitError::VocalNotFound(name));
            }
            Err(e) => return Err(e.into()),
        };
        if metadata.len() == 0 {
            return Err(SpeakerSplitError::VocalEmpty(name));
        }

        let path = vocal.to_path_buf();
        let asset = tokio::task::spawn_blocking(move || load_native(&path))
            .await
            .map_err(|e| SpeakerSplitError::Task(e.to_string()))?
            .map_err(|e| match e {
                AudioIoError::NotFound(_) => SpeakerSplitError::VocalNotFound(name.clone()),
                other => SpeakerSplitError::VocalMalformed(other.to_string()),
            })?;

        tokio::fs::create_dir_all(speakers_dir).await?;
        let cleared = clear_speaker_files_in(speakers_dir)?;
        debug!(cleared, "Cleared previous speaker files");

        let turns = match tokio::time::timeout(self.timeout, self.diarization.diarize(vocal, &token)).await {
            Ok(Ok(turns)) => turns,
            Ok(Err(e)) => return Err(SpeakerSplitError::Diarization(e)),
            Err(_) => return Err(SpeakerSplitError::Diarization(ModelError::Timeout(self.timeout))),
        };

        info!(turns = turns.len(), "Diarization returned");

        let groups = group_turns(&turns, self.ordering);
        if groups.is_empty() {
            return Ok(BTreeMap::new());
        }

        let dir = speakers_dir.to_path_buf();
        tokio::task::spawn_blocking(move || write_tracks(&asset, groups, &dir))
            .await
            .map_err(|e| SpeakerSplitError::Task(e.to_string()))?
    }
}

fn write_tracks(
    asset: &AudioAsset,
    groups: Vec<(SpeakerKey, Vec<(f64, f64)>)>,
    dir: &Path,
) -> Result<BTreeMap<SpeakerKey, SpeakerTrack>, SpeakerSplitError> {
    let mut tracks = BTreeMap::new();

    for (key, intervals) in groups {
        let track = extract_intervals(asset, &intervals);
        if track.is_empty() {
            warn!(speaker = %key, "All intervals fall outside the audio, skipping");
            continue;
        }

        let path: PathBuf = dir.join(key.file_name());
        write_wav(&path, &track, SampleEncoding::Pcm16).map_err(SpeakerSplitError::Write)?;

        info!(
            speaker = %key,
            intervals = intervals.len(),
            seconds = track.duration_seconds(),
            "Wrote {}",
            path.display()
        );

        tracks.insert(
            key.clone(),
            SpeakerTrack {
                key,
                intervals,
                path,
                frames: track.frames(),
                sample_rate: track.sample_rate,
                channels: track.channels,
            },
        );
    }

    Ok(tracks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(start: f64, end: f64, speaker: &str) -> SpeakerTurn {
        SpeakerTurn::new(start, end, speaker)
    }

    #[test]
    fn test_grouping_keeps_returned_order() {
        let turns = vec![
            turn(5.0, 6.0, "SPEAKER_00"),
            turn(1.0, 2.0, "SPEAKER_01"),
            turn(0.0, 1.0, "SPEAKER_00"),
        ];

        let groups = group_turns(&turns, IntervalOrdering::AsReturned);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0.as_str(), "speaker00");
        assert_eq!(groups[0].1, vec![(5.0, 6.0), (0.0, 1.0)]);
        assert_eq!(groups[1].1, vec![(1.0, 2.0)]);
    }

    #[test]
    fn test_grouping_can_sort_by_start() {
        let turns = vec![turn(5.0, 6.0, "A"), turn(0.0, 1.0, "a")];
        let groups = group_turns(&turns, IntervalOrdering::ByStart);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].1, vec![(0.0, 1.0), (5.0, 6.0)]);
    }

    #[test]
    fn test_grouping_drops_invalid_turns() {
        let turns = vec![
            turn(2.0, 1.0, "A"),
            turn(f64::NAN, 1.0, "A"),
            turn(0.0, 1.0, "__"),
            turn(0.0, 1.0, "B"),
        ];
        let groups = group_turns(&turns, IntervalOrdering::AsReturned);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0.as_str(), "b");
    }

    #[test]
    fn test_extract_concatenates_in_given_order() {
        let asset = AudioAsset::mono((0..100).map(|i| i as f32).collect(), 10);
        let track = extract_intervals(&asset, &[(5.0, 6.0), (1.0, 2.0)]);
        let expected: Vec<f32> = (50..60).chain(10..20).map(|i| i as f32).collect();
        assert_eq!(track.samples, expected);
    }

    #[test]
    fn test_extract_clamps_to_signal() {
        let asset = AudioAsset::new((0..40).map(|i| i as f32).collect(), 10, 2);
        let track = extract_intervals(&asset, &[(1.5, 99.0), (50.0, 60.0)]);
        assert_eq!(track.frames(), 5);
        assert_eq!(track.samples[0], 30.0);
    }
}
