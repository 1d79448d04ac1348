//! Pipeline run summary

use super::{ComponentLabel, Scope};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Stage a pipeline run was in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Decode,
    Segment,
    Separate,
    Merge,
    Enhance,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Decode => "decode",
            PipelineStage::Segment => "segment",
            PipelineStage::Separate => "separate",
            PipelineStage::Merge => "merge",
            PipelineStage::Enhance => "enhance",
        };
        f.write_str(name)
    }
}

/// A chunk that contributed nothing to any component
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkFailure {
    pub index: usize,
    pub reason: String,
}

/// Outcome of one upload's pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    #[serde(skip)]
    pub scope: Scope,
    pub total_chunks: usize,
    pub succeeded_chunks: Vec<usize>,
    pub failed_chunks: Vec<ChunkFailure>,
    /// Canonical denoised file names, `None` where a component is unavailable
    pub components: BTreeMap<ComponentLabel, Option<String>>,
}

impl PipelineReport {
    /// Names of every component that produced a denoised artifact
    pub fn available_files(&self) -> Vec<String> {
        self.components.values().flatten().cloned().collect()
    }
}
