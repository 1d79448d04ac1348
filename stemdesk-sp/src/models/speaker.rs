//! Speaker identities and diarization turns

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Filesystem-safe speaker identifier derived from a diarization label
///
/// Holds the normalized label (lowercase ASCII alphanumerics only); the artifact name is
/// `speaker_<label>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpeakerKey(String);

#[derive(Debug, Clone, Error)]
#[error("Speaker label {0:?} has no usable characters")]
pub struct InvalidSpeakerLabel(pub String);

impl SpeakerKey {
    pub fn from_label(raw: &str) -> Result<Self, InvalidSpeakerLabel> {
        let normalized: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        if normalized.is_empty() {
            return Err(InvalidSpeakerLabel(raw.to_string()));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_stem(&self) -> String {
        format!("speaker_{}", self.0)
    }

    pub fn file_name(&self) -> String {
        format!("{}.wav", self.file_stem())
    }
}

impl fmt::Display for SpeakerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "speaker_{}", self.0)
    }
}

/// One attributed interval returned by diarization (seconds, source-file time)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerTurn {
    pub start: f64,
    pub end: f64,
    pub speaker: String,
}

impl SpeakerTurn {
    pub fn new(start: f64, end: f64, speaker: impl Into<String>) -> Self {
        Self {
            start,
            end,
            speaker: speaker.into(),
        }
    }
}

/// How a speaker's intervals are ordered before concatenation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntervalOrdering {
    /// Keep the order the diarization service returned
    #[default]
    AsReturned,
    /// Sort each speaker's intervals by start time
    ByStart,
}

/// Concatenated audio for one speaker
#[derive(Debug, Clone)]
pub struct SpeakerTrack {
    pub key: SpeakerKey,
    /// Intervals in concatenation order
    pub intervals: Vec<(f64, f64)>,
    pub path: PathBuf,
    pub frames: usize,
    pub sample_rate: u32,
    pub channels: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_matches_reference_naming() {
        let key = SpeakerKey::from_label("SPEAKER_00").unwrap();
        assert_eq!(key.as_str(), "speaker00");
        assert_eq!(key.file_name(), "speaker_speaker00.wav");
    }

    #[test]
    fn test_key_strips_path_characters() {
        let key = SpeakerKey::from_label("../Alice B./").unwrap();
        assert_eq!(key.as_str(), "aliceb");
        assert_eq!(key.to_string(), "speaker_aliceb");
    }

    #[test]
    fn test_key_rejects_symbol_only_labels() {
        assert!(SpeakerKey::from_label("__-/").is_err());
        assert!(SpeakerKey::from_label("").is_err());
    }

    #[test]
    fn test_turn_deserializes_from_service_json() {
        let turns: Vec<SpeakerTurn> =
            serde_json::from_str(r#"[{"start": 0.5, "end": 2.25, "speaker": "SPEAKER_01"}]"#)
                .unwrap();
        assert_eq!(turns, vec![SpeakerTurn::new(0.5, 2.25, "SPEAKER_01")]);
    }
}
