//! Configuration loading and root folder resolution
//!
//! Resolution order for the root folder:
//! 1. Command-line argument (highest priority)
//! 2. `STEMDESK_ROOT_FOLDER`, then `STEMDESK_ROOT` environment variable
//! 3. `root_folder` in the module's TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable TOML file never stops startup: the caller gets compiled
//! defaults and a warning.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the workspace directory created under the root folder
pub const WORKSPACE_DIR_NAME: &str = "uploads";

/// Compiled defaults used when no configuration is available
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was compiled for
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            host: "127.0.0.1".to_string(),
            port: 5790,
        }
    }
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/stemdesk (or /var/lib/stemdesk for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("stemdesk"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/stemdesk"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("stemdesk"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/stemdesk"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("stemdesk"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\stemdesk"))
    } else {
        PathBuf::from("./stemdesk_data")
    }
}

/// Resolves the root folder for one module
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    config_path: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            config_path: None,
        }
    }

    /// Set the command-line override (highest priority)
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Read the TOML config from `path` instead of the per-user location
    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    /// Path of this module's TOML config file
    ///
    /// An explicit path set with [`Self::with_config_path`] wins. Otherwise Linux prefers `~/.config/stemdesk/<module>.toml` and falls back to
    /// `/etc/stemdesk/<module>.toml` when only the system file exists.
    pub fn config_file_path(&self) -> PathBuf {
        if let Some(path) = &self.config_path {
            return path.clone();
        }

        let file_name = format!("{}.toml", self.module_name);
        let user_config = dirs::config_dir().map(|d| d.join("stemdesk").join(&file_name));

        if cfg!(target_os = "linux") {
            let system_config = PathBuf::from("/etc/stemdesk").join(&file_name);
            match user_config {
                Some(path) if path.exists() || !system_config.exists() => path,
                _ => system_config,
            }
        } else {
            user_config.unwrap_or_else(|| PathBuf::from(file_name))
        }
    }

    /// Resolve the root folder, never failing
    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(root = %path.display(), "Root folder from command line");
            return path.clone();
        }

        for var in ["STEMDESK_ROOT_FOLDER", "STEMDESK_ROOT"] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    debug!(root = %path, source = var, "Root folder from environment");
                    return PathBuf::from(path);
                }
            }
        }

        let config_path = self.config_file_path();
        match load_toml_config(&config_path) {
            Ok(config) => {
                if let Some(root) = config.root_folder {
                    debug!(root = %root.display(), "Root folder from TOML config");
                    return root;
                }
            }
            Err(e) => warn!("Ignoring unreadable config {}: {}", config_path.display(), e),
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder layout on first start
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Shared artifact workspace under the root folder
    pub fn workspace_path(&self) -> PathBuf {
        self.root_folder.join(WORKSPACE_DIR_NAME)
    }

    /// Create the root folder and workspace (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(self.workspace_path()).map_err(|e| {
            Error::Config(format!(
                "Cannot create workspace under {}: {}",
                self.root_folder.display(),
                e
            ))
        })
    }
}

/// Logging section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing` filter directive or plain level
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "stemdesk_sp=info,tower_http=info".to_string(),
        }
    }
}

/// HTTP server section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted upload in megabytes
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let defaults = CompiledDefaults::for_current_platform();
        Self {
            host: defaults.host,
            port: defaults.port,
            max_upload_mb: 512,
        }
    }
}

/// Separation pipeline section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Canonical decode rate for segmentation and enhancement
    pub sample_rate: u32,
    pub segment_seconds: f64,
    pub target_dbfs: f64,
    /// Upper bound for any single external model invocation
    pub model_timeout_secs: u64,
    /// Separation calls in flight at once (results are still merged in chunk order)
    pub separation_concurrency: usize,
    /// Concatenate speaker intervals by start time instead of diarization order
    pub sort_speaker_intervals: bool,
    /// Give each upload its own `sessions/<id>` directory
    pub session_isolation: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            segment_seconds: 10.0,
            target_dbfs: -20.0,
            model_timeout_secs: 900,
            separation_concurrency: 1,
            sort_speaker_intervals: false,
            session_isolation: false,
        }
    }
}

/// Workspace retention section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub max_age_hours: u64,
    pub sweep_interval_minutes: u64,
    pub purge_on_shutdown: bool,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_hours: 24,
            sweep_interval_minutes: 60,
            purge_on_shutdown: true,
        }
    }
}

/// External program invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCommand {
    pub program: PathBuf,
    #[serde(default)]
    pub args: Vec<String>,
}

/// Enhancement model program plus the channel layout it expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementModelConfig {
    #[serde(flatten)]
    pub command: ModelCommand,
    #[serde(default = "default_enhancement_channels")]
    pub channels: u16,
}

fn default_enhancement_channels() -> u16 {
    2
}

/// Diarization backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DiarizationBackendConfig {
    /// Local program printing a JSON array of turns
    Command(ModelCommand),
    /// Remote service accepting WAV bytes
    Http { endpoint: String },
}

/// External model section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub separation: Option<ModelCommand>,
    pub enhancement: Option<EnhancementModelConfig>,
    pub diarization: Option<DiarizationBackendConfig>,
}

/// Contents of `<module>.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    /// Fallback for the `HUGGINGFACE_TOKEN` environment variable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diarization_token: Option<String>,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub retention: RetentionConfig,
    pub models: ModelsConfig,
}

/// Load a TOML config file
///
/// A missing file yields defaults with a warning; a present but invalid file is an error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using compiled defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Write a TOML config file atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}
