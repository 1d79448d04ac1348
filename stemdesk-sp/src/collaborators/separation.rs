//! Process-backed separation model

use super::process::run_model;
use super::{ModelError, SeparationModel};
use crate::models::ComponentLabel;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use stemdesk_common::config::ModelCommand;
use tracing::debug;

/// Runs `<program> <args..> <chunk> <out_dir>`
///
/// The program prints a JSON object mapping stem names to the files it wrote, e.g.
/// `{"vocals": "temp_chunk_0_vocals.wav", ...}`. Relative paths are resolved against
/// `out_dir`, which is the chunk's own directory.
pub struct CommandSeparationModel {
    command: ModelCommand,
}

impl CommandSeparationModel {
    pub fn new(command: ModelCommand) -> Self {
        Self { command }
    }
}

#[async_trait]
impl SeparationModel for CommandSeparationModel {
    async fn separate(&self, chunk: &Path) -> Result<HashMap<ComponentLabel, PathBuf>, ModelError> {
        if !chunk.exists() {
            return Err(ModelError::FileNotFound(chunk.display().to_string()));
        }
        let out_dir = chunk
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let stdout = run_model(&self.command, [chunk.as_os_str(), out_dir.as_os_str()], None).await?;
        parse_stem_listing(&stdout, &out_dir)
    }
}

fn parse_stem_listing(stdout: &str, out_dir: &Path) -> Result<HashMap<ComponentLabel, PathBuf>, ModelError> {
    let listing: HashMap<String, PathBuf> =
        serde_json::from_str(stdout.trim()).map_err(|e| ModelError::Parse(e.to_string()))?;

    let mut stems = HashMap::new();
    for (name, path) in listing {
        match name.parse::<ComponentLabel>() {
            Ok(label) => {
                let path = if path.is_absolute() { path } else { out_dir.join(path) };
                stems.insert(label, path);
            }
            Err(_) => debug!(stem = %name, "Ignoring unknown stem from separation model"),
        }
    }
    Ok(stems)
}
