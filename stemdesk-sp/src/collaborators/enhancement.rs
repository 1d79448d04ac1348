//! Enhancement model backends

use super::process::run_model;
use super::{EnhancementModel, ModelError};
use crate::models::AudioAsset;
use crate::services::audio_io::{self, SampleEncoding};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use stemdesk_common::config::ModelCommand;
use tracing::debug;

/// Runs `<program> <args..> <in.wav> <out.wav>` on temporary files
///
/// Both files live in a per-call temporary directory that is removed when the call
/// finishes or its future is dropped, including on timeout.
pub struct CommandEnhancementModel {
    command: ModelCommand,
    channels: u16,
    temp_root: PathBuf,
}

impl CommandEnhancementModel {
    pub fn new(command: ModelCommand, channels: u16) -> Self {
        Self {
            command,
            channels: channels.max(1),
            temp_root: std::env::temp_dir(),
        }
    }

    /// Create the per-call directories under `root` instead of the system temp dir
    pub fn with_temp_root(mut self, root: PathBuf) -> Self {
        self.temp_root = root;
        self
    }
}

#[async_trait]
impl EnhancementModel for CommandEnhancementModel {
    fn input_channels(&self) -> u16 {
        self.channels
    }

    async fn enhance(&self, input: AudioAsset) -> Result<AudioAsset, ModelError> {
        let workdir = tempfile::Builder::new()
            .prefix("stemdesk_enhance_")
            .tempdir_in(&self.temp_root)?;
        let temp_in = workdir.path().join("in.wav");
        let temp_out = workdir.path().join("out.wav");

        debug!(
            input_file = %temp_in.display(),
            output_file = %temp_out.display(),
            "Running enhancement model"
        );

        self.run(input, &temp_in, &temp_out).await
    }
}

impl CommandEnhancementModel {
    async fn run(&self, input: AudioAsset, temp_in: &Path, temp_out: &Path) -> Result<AudioAsset, ModelError> {
        let write_path = temp_in.to_path_buf();
        tokio::task::spawn_blocking(move || audio_io::write_wav(&write_path, &input, SampleEncoding::Float32))
            .await
            .map_err(|e| ModelError::Execution(format!("Enhancement input task failed: {}", e)))?
            .map_err(|e| ModelError::Audio(e.to_string()))?;

        run_model(&self.command, [temp_in.as_os_str(), temp_out.as_os_str()], None).await?;

        if !temp_out.exists() {
            return Err(ModelError::Execution(format!(
                "{} wrote no output file",
                self.command.program.display()
            )));
        }

        let read_path = temp_out.to_path_buf();
        tokio::task::spawn_blocking(move || audio_io::read_wav(&read_path))
            .await
            .map_err(|e| ModelError::Execution(format!("Enhancement output task failed: {}", e)))?
            .map_err(|e| ModelError::Audio(e.to_string()))
    }
}

/// Returns its input unchanged
///
/// Used when no enhancement program is configured so downstream names stay stable.
pub struct PassthroughEnhancement;

#[async_trait]
impl EnhancementModel for PassthroughEnhancement {
    fn input_channels(&self) -> u16 {
        1
    }

    async fn enhance(&self, input: AudioAsset) -> Result<AudioAsset, ModelError> {
        Ok(input)
    }
}
