//! Persisted artifacts produced by the pipeline stages

use super::ComponentLabel;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

/// One persisted chunk of the source signal
///
/// `index` is the only ordering key used downstream.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub index: usize,
    pub path: PathBuf,
    pub frames: usize,
    pub sample_rate: u32,
    /// Upload this chunk was cut from
    pub source: PathBuf,
}

impl Segment {
    pub fn duration_seconds(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }
}

/// `merged_<component>.wav`
#[derive(Debug, Clone)]
pub struct MergedArtifact {
    pub label: ComponentLabel,
    pub path: PathBuf,
    pub frames: usize,
    pub sample_rate: u32,
    /// Chunk indices that contributed, in concatenation order
    pub chunk_indices: Vec<usize>,
}

/// `denoised_merged_<component>.wav`
#[derive(Debug, Clone)]
pub struct EnhancedArtifact {
    pub label: ComponentLabel,
    pub path: PathBuf,
    pub source: PathBuf,
}

/// `<stem>_normalized.wav`
#[derive(Debug, Clone)]
pub struct NormalizedArtifact {
    pub path: PathBuf,
    pub source: PathBuf,
    pub measured_dbfs: f64,
    pub gain_db: f64,
}

/// Top-level workspace file as seen by the retention sweep
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceEntry {
    pub name: String,
    pub path: PathBuf,
    pub last_modified: DateTime<Utc>,
}
