//! Per-component enhancement with failure isolation

use crate::collaborators::{EnhancementModel, ModelError};
use crate::models::{ComponentLabel, EnhancedArtifact, MergedArtifact};
use crate::services::artifact_store::denoised_file_name;
use crate::services::audio_io::{write_wav, AudioIoError, AudioLoader, SampleEncoding};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum EnhancementError {
    #[error("Cannot load merged component: {0}")]
    Load(#[source] AudioIoError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Enhancement produced no audio")]
    EmptyOutput,

    #[error("Cannot write enhanced component: {0}")]
    Write(#[source] AudioIoError),

    #[error("Blocking task failed: {0}")]
    Task(String),
}

/// Runs the enhancement model over every merged component independently
pub struct EnhancementOrchestrator {
    model: Arc<dyn EnhancementModel>,
    sample_rate: u32,
    timeout: Duration,
}

impl EnhancementOrchestrator {
    pub fn new(model: Arc<dyn EnhancementModel>, sample_rate: u32, timeout: Duration) -> Self {
        Self {
            model,
            sample_rate,
            timeout,
        }
    }

    /// Enhance each component; failures are logged and the component is left out
    pub async fn enhance_all(
        &self,
        merged: &BTreeMap<ComponentLabel, MergedArtifact>,
        dir: &Path,
    ) -> BTreeMap<ComponentLabel, EnhancedArtifact> {
        let mut enhanced = BTreeMap::new();

        for (label, artifact) in merged {
            let output = dir.join(denoised_file_name(*label));
            match self.enhance_one(&artifact.path, &output).await {
                Ok(()) => {
                    info!(component = %label, "Enhanced {}", output.display());
                    enhanced.insert(
                        *label,
                        EnhancedArtifact {
                            label: *label,
                            path: output,
                            source: artifact.path.clone(),
                        },
                    );
                }
                Err(e) => warn!(component = %label, "Enhancement failed: {}", e),
            }
        }

        enhanced
    }

    /// Decode, widen to the model's layout, enhance, fold to mono, write 16-bit PCM
    async fn enhance_one(&self, input: &Path, output: &Path) -> Result<(), EnhancementError> {
        let loader = AudioLoader::new(self.sample_rate);
        let path = input.to_path_buf();
        let mono = tokio::task::spawn_blocking(move || loader.load_mono(&path))
            .await
            .map_err(|e| EnhancementError::Task(e.to_string()))?
            .map_err(EnhancementError::Load)?;

        let prepared = mono.widen(self.model.input_channels());

        let enhanced = match tokio::time::timeout(self.timeout, self.model.enhance(prepared)).await {
            Ok(result) => result?,
            Err(_) => return Err(ModelError::Timeout(self.timeout).into()),
        };

        let folded = enhanced.into_mono();
        if folded.is_empty() {
            return Err(EnhancementError::EmptyOutput);
        }

        let output: PathBuf = output.to_path_buf();
        tokio::task::spawn_blocking(move || write_wav(&output, &folded, SampleEncoding::Pcm16))
            .await
            .map_err(|e| EnhancementError::Task(e.to_string()))?
            .map_err(EnhancementError::Write)
    }
}
