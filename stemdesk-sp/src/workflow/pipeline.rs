//! Upload → segment → separate → merge → enhance

use crate::collaborators::Collaborators;
use crate::config::ServiceConfig;
use crate::models::{ChunkFailure, ComponentLabel, MergedArtifact, PipelineReport, PipelineStage, Scope};
use crate::services::artifact_store::{denoised_file_name, merged_file_name, normalized_file_name, BUNDLE_FILE_NAME};
use crate::services::{
    merger, ArtifactStore, AudioIoError, AudioLoader, ComponentRouter, EnhancementOrchestrator, SegmentError,
    Segmenter, StoreError,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Cannot decode uploaded audio: {0}")]
    Input(#[source] AudioIoError),

    #[error(transparent)]
    Segment(#[from] SegmentError),

    #[error("No chunks survived separation ({failed} of {total} failed)")]
    NoSurvivingChunks { total: usize, failed: usize },

    #[error("No component could be merged")]
    NoMergedComponents,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{stage} task failed: {reason}")]
    Task { stage: PipelineStage, reason: String },
}

impl PipelineError {
    fn task(stage: PipelineStage, e: tokio::task::JoinError) -> Self {
        PipelineError::Task {
            stage,
            reason: e.to_string(),
        }
    }
}

/// Runs the full separation pipeline for one upload
pub struct SeparationPipeline {
    store: ArtifactStore,
    sample_rate: u32,
    segmenter: Segmenter,
    router: ComponentRouter,
    enhancer: EnhancementOrchestrator,
}

impl SeparationPipeline {
    pub fn new(config: &ServiceConfig, store: ArtifactStore, collaborators: &Collaborators) -> Result<Self, SegmentError> {
        Ok(Self {
            store,
            sample_rate: config.sample_rate,
            segmenter: Segmenter::new(config.sample_rate, config.segment_seconds)?,
            router: ComponentRouter::new(
                collaborators.separation.clone(),
                config.model_timeout,
                config.separation_concurrency,
            ),
            enhancer: EnhancementOrchestrator::new(
                collaborators.enhancement.clone(),
                config.sample_rate,
                config.model_timeout,
            ),
        })
    }

    /// Process `upload` into the scope's denoised component artifacts
    ///
    /// The caller must hold the scope lock.
    pub async fn run(&self, scope: Scope, upload: &Path) -> Result<PipelineReport, PipelineError> {
        let dir = self.store.ensure_dir(scope)?;
        info!(scope = %scope, upload = %upload.display(), "Pipeline started");

        self.clear_previous_outputs(scope, &dir);

        let loader = AudioLoader::new(self.sample_rate);
        let source = upload.to_path_buf();
        let asset = tokio::task::spawn_blocking(move || loader.load_mono(&source))
            .await
            .map_err(|e| PipelineError::task(PipelineStage::Decode, e))?
            .map_err(PipelineError::Input)?;
        info!(seconds = asset.duration_seconds(), "Decoded upload");

        let segmenter = self.segmenter.clone();
        let (source, chunk_dir) = (upload.to_path_buf(), dir.clone());
        let segmentation = tokio::task::spawn_blocking(move || segmenter.segment(&asset, &source, &chunk_dir))
            .await
            .map_err(|e| PipelineError::task(PipelineStage::Segment, e))??;

        let accumulator = self.router.route(&segmentation.segments).await;
        let chunk_files: Vec<PathBuf> = segmentation.segments.iter().map(|s| s.path.clone()).collect();

        let total = segmentation.segments.len() + segmentation.failed_writes.len();
        let mut failed_chunks: Vec<ChunkFailure> = segmentation
            .failed_writes
            .iter()
            .map(|&index| ChunkFailure {
                index,
                reason: "chunk could not be written".to_string(),
            })
            .chain(accumulator.failed().iter().cloned())
            .collect();
        failed_chunks.sort_by_key(|f| f.index);

        if accumulator.is_empty() {
            merger::release_chunks(chunk_files.iter().map(PathBuf::as_path));
            error!(total, "Every chunk failed separation");
            return Err(PipelineError::NoSurvivingChunks {
                total,
                failed: failed_chunks.len(),
            });
        }

        let (stems, succeeded, _) = accumulator.into_parts();
        let merge_dir = dir.clone();
        let indices = succeeded.clone();
        let merged = tokio::task::spawn_blocking(move || {
            let mut merged: BTreeMap<ComponentLabel, MergedArtifact> = BTreeMap::new();
            for (label, sources) in stems.into_pairs() {
                let output = merge_dir.join(merged_file_name(label));
                match merger::merge(label, &sources, &indices, &output) {
                    Ok(artifact) => {
                        merged.insert(label, artifact);
                    }
                    Err(e) => {
                        warn!(component = %label, "Merge failed: {}", e);
                        merger::release_chunks(sources.iter().map(PathBuf::as_path));
                    }
                }
            }
            merger::release_chunks(chunk_files.iter().map(PathBuf::as_path));
            merged
        })
        .await
        .map_err(|e| PipelineError::task(PipelineStage::Merge, e))?;

        if merged.is_empty() {
            error!("No component could be merged");
            return Err(PipelineError::NoMergedComponents);
        }

        let enhanced = self.enhancer.enhance_all(&merged, &dir).await;

        let components = ComponentLabel::ALL
            .into_iter()
            .map(|label| (label, enhanced.get(&label).map(|_| denoised_file_name(label))))
            .collect();

        let report = PipelineReport {
            scope,
            total_chunks: total,
            succeeded_chunks: succeeded,
            failed_chunks,
            components,
        };

        info!(
            scope = %scope,
            succeeded = report.succeeded_chunks.len(),
            failed = report.failed_chunks.len(),
            available = report.available_files().len(),
            "Pipeline finished"
        );
        Ok(report)
    }

    /// Remove the outputs of an earlier run so stale files are never served
    ///
    /// Covers the fixed-name component artifacts, their normalized copies, the bundle
    /// and every speaker track of the scope.
    fn clear_previous_outputs(&self, scope: Scope, dir: &Path) {
        let stale: Vec<PathBuf> = ComponentLabel::ALL
            .into_iter()
            .flat_map(|label| {
                let denoised = denoised_file_name(label);
                [merged_file_name(label), normalized_file_name(&denoised), denoised]
            })
            .chain([BUNDLE_FILE_NAME.to_string()])
            .map(|name| dir.join(name))
            .filter(|path| path.is_file())
            .collect();

        for path in stale {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed previous output {}", path.display()),
                Err(e) => warn!("Failed to remove previous output {}: {}", path.display(), e),
            }
        }

        match self.store.clear_speaker_files(scope) {
            Ok(0) => {}
            Ok(cleared) => debug!(cleared, "Removed previous speaker tracks"),
            Err(e) => warn!("Failed to remove previous speaker tracks: {}", e),
        }
    }
}
