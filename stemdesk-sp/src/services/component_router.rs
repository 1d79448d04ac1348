//! Per-chunk separation and distribution into component accumulators
//!
//! Each chunk is all-or-nothing: either all four stems are accepted or the chunk
//! contributes to no component. Separation calls may run concurrently, but results
//! are consumed in chunk index order so every accumulator stays time-aligned.

use crate::collaborators::{ModelError, SeparationModel};
use crate::models::{ChunkFailure, ComponentLabel, Segment, StemSet};
use futures::stream::{self, StreamExt};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Outcome of separating one chunk
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkSeparation {
    Complete(StemSet<PathBuf>),
    Failed { reason: String },
}

/// Per-component ordered stem files plus which chunks produced them
///
/// Every slot holds exactly `succeeded.len()` paths, in chunk index order.
#[derive(Debug, Clone, Default)]
pub struct ComponentAccumulator {
    stems: StemSet<Vec<PathBuf>>,
    succeeded: Vec<usize>,
    failed: Vec<ChunkFailure>,
}

impl ComponentAccumulator {
    /// Record one chunk's outcome; calls must arrive in index order
    pub fn accept(&mut self, index: usize, outcome: ChunkSeparation) {
        match outcome {
            ChunkSeparation::Complete(stems) => {
                for (label, path) in stems.into_pairs() {
                    self.stems.get_mut(label).push(path);
                }
                self.succeeded.push(index);
            }
            ChunkSeparation::Failed { reason } => {
                warn!(chunk = index, "Chunk skipped: {}", reason);
                self.failed.push(ChunkFailure { index, reason });
            }
        }
    }

    pub fn sequence(&self, label: ComponentLabel) -> &[PathBuf] {
        self.stems.get(label)
    }

    pub fn succeeded(&self) -> &[usize] {
        &self.succeeded
    }

    pub fn failed(&self) -> &[ChunkFailure] {
        &self.failed
    }

    pub fn is_empty(&self) -> bool {
        self.succeeded.is_empty()
    }

    pub fn into_parts(self) -> (StemSet<Vec<PathBuf>>, Vec<usize>, Vec<ChunkFailure>) {
        (self.stems, self.succeeded, self.failed)
    }
}

/// Drives the separation model over a chunk sequence
pub struct ComponentRouter {
    separation: Arc<dyn SeparationModel>,
    timeout: Duration,
    concurrency: usize,
}

impl ComponentRouter {
    pub fn new(separation: Arc<dyn SeparationModel>, timeout: Duration, concurrency: usize) -> Self {
        Self {
            separation,
            timeout,
            concurrency: concurrency.max(1),
        }
    }

    /// Separate every segment and accumulate complete results in index order
    pub async fn route(&self, segments: &[Segment]) -> ComponentAccumulator {
        let mut ordered: Vec<(usize, PathBuf)> = segments.iter().map(|s| (s.index, s.path.clone())).collect();
        ordered.sort_by_key(|(index, _)| *index);

        let separation = self.separation.clone();
        let timeout = self.timeout;
        let outcomes: Vec<(usize, ChunkSeparation)> = stream::iter(ordered)
            .map(move |(index, path)| separate_chunk(separation.clone(), timeout, index, path))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut accumulator = ComponentAccumulator::default();
        for (index, outcome) in outcomes {
            accumulator.accept(index, outcome);
        }

        info!(
            succeeded = accumulator.succeeded().len(),
            failed = accumulator.failed().len(),
            "Separation finished"
        );
        accumulator
    }
}

/// Separate one chunk file; a rejected result has its stem files removed
async fn separate_chunk(
    separation: Arc<dyn SeparationModel>,
    timeout: Duration,
    index: usize,
    path: PathBuf,
) -> (usize, ChunkSeparation) {
    debug!(chunk = index, path = %path.display(), "Separating chunk");

    let result = match tokio::time::timeout(timeout, separation.separate(&path)).await {
        Ok(result) => result,
        Err(_) => Err(ModelError::Timeout(timeout)),
    };

    let stems = match result {
        Ok(stems) => stems,
        Err(e) => {
            return (
                index,
                ChunkSeparation::Failed {
                    reason: e.to_string(),
                },
            )
        }
    };

    let returned: Vec<PathBuf> = stems.values().cloned().collect();
    let stems = match StemSet::try_from_map(stems) {
        Ok(stems) => stems,
        Err(missing) => {
            discard_stems(index, &returned);
            return (
                index,
                ChunkSeparation::Failed {
                    reason: missing.to_string(),
                },
            );
        }
    };

    let absent: Vec<String> = stems
        .iter()
        .filter(|(_, path)| !path.is_file())
        .map(|(label, path)| format!("{} ({})", label, path.display()))
        .collect();
    if !absent.is_empty() {
        discard_stems(index, &returned);
        return (
            index,
            ChunkSeparation::Failed {
                reason: format!("stem files not found: {}", absent.join(", ")),
            },
        );
    }

    (index, ChunkSeparation::Complete(stems))
}

fn discard_stems(index: usize, paths: &[PathBuf]) {
    for path in paths.iter().filter(|p| p.is_file()) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!(chunk = index, "Failed to remove rejected stem {}: {}", path.display(), e);
        }
    }
}
