//! External model collaborators
//!
//! The pipeline only talks to these traits. Concrete handles are built once at startup
//! from `[models]` and injected through [`Collaborators`]; tests inject fakes.

mod diarization;
mod enhancement;
mod process;
mod separation;

pub use diarization::{CommandDiarizer, DisabledDiarizer, HttpDiarizer};
pub use enhancement::{CommandEnhancementModel, PassthroughEnhancement};
pub use separation::CommandSeparationModel;

use crate::config::AccessToken;
use crate::models::{AudioAsset, ComponentLabel, SpeakerTurn};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use stemdesk_common::config::{DiarizationBackendConfig, ModelsConfig};
use thiserror::Error;
use tracing::info;

/// Collaborator failures
#[derive(Debug, Error)]
pub enum ModelError {
    /// No backend configured for this collaborator
    #[error("{0} model is not configured")]
    NotConfigured(&'static str),

    /// Model program missing from disk/PATH
    #[error("Model program not found: {0}")]
    ProgramNotFound(String),

    /// Input handed to the model does not exist
    #[error("Input file not found: {0}")]
    FileNotFound(String),

    /// Model ran but reported failure
    #[error("Model execution failed: {0}")]
    Execution(String),

    /// Model output could not be interpreted
    #[error("Failed to parse model output: {0}")]
    Parse(String),

    /// Invocation exceeded the configured bound
    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Diarization request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Audio I/O failed: {0}")]
    Audio(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Splits one chunk into its four component streams
#[async_trait]
pub trait SeparationModel: Send + Sync {
    /// Returns the path written for every label the model produced
    async fn separate(&self, chunk: &Path) -> Result<HashMap<ComponentLabel, PathBuf>, ModelError>;
}

/// Denoises one merged component
#[async_trait]
pub trait EnhancementModel: Send + Sync {
    /// Channel layout the model expects its input in
    fn input_channels(&self) -> u16;

    async fn enhance(&self, input: AudioAsset) -> Result<AudioAsset, ModelError>;
}

/// Attributes time intervals of a vocal track to speakers
#[async_trait]
pub trait DiarizationService: Send + Sync {
    async fn diarize(&self, audio: &Path, token: &AccessToken) -> Result<Vec<SpeakerTurn>, ModelError>;
}

/// Collaborator handles injected into the pipeline
#[derive(Clone)]
pub struct Collaborators {
    pub separation: Arc<dyn SeparationModel>,
    pub enhancement: Arc<dyn EnhancementModel>,
    pub diarization: Arc<dyn DiarizationService>,
}

impl Collaborators {
    /// Build handles from `[models]`
    ///
    /// Separation is mandatory. Enhancement falls back to a passthrough and diarization
    /// to a backend that reports itself unconfigured.
    pub fn from_config(models: &ModelsConfig) -> Result<Self, ModelError> {
        let separation = models
            .separation
            .clone()
            .ok_or(ModelError::NotConfigured("Separation"))?;
        info!(program = %separation.program.display(), "Separation model");
        let separation: Arc<dyn SeparationModel> = Arc::new(CommandSeparationModel::new(separation));

        let enhancement: Arc<dyn EnhancementModel> = match &models.enhancement {
            Some(config) => {
                info!(
                    program = %config.command.program.display(),
                    channels = config.channels,
                    "Enhancement model"
                );
                Arc::new(CommandEnhancementModel::new(config.command.clone(), config.channels))
            }
            None => {
                info!("No enhancement model configured, merged components pass through unchanged");
                Arc::new(PassthroughEnhancement)
            }
        };

        let diarization: Arc<dyn DiarizationService> = match &models.diarization {
            Some(DiarizationBackendConfig::Command(command)) => {
                info!(program = %command.program.display(), "Diarization program");
                Arc::new(CommandDiarizer::new(command.clone()))
            }
            Some(DiarizationBackendConfig::Http { endpoint }) => {
                info!(endpoint = %endpoint, "Diarization service");
                Arc::new(HttpDiarizer::new(endpoint.clone()))
            }
            None => {
                info!("No diarization backend configured, speaker separation disabled");
                Arc::new(DisabledDiarizer)
            }
        };

        Ok(Self {
            separation,
            enhancement,
            diarization,
        })
    }
}
