//! Runtime configuration for the separation service
//!
//! Derived once at startup from the TOML sections in `stemdesk_common::config`.

use crate::models::IntervalOrdering;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use stemdesk_common::config::TomlConfig;
use thiserror::Error;

/// Environment variable holding the diarization credential
pub const TOKEN_ENV_VAR: &str = "HUGGINGFACE_TOKEN";

/// Shortest credential accepted as plausibly valid
pub const MIN_TOKEN_LEN: usize = 10;

/// Settings every stage reads
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Workspace root (`<root>/uploads`)
    pub workspace: PathBuf,
    pub sample_rate: u32,
    pub segment_seconds: f64,
    pub target_dbfs: f64,
    pub model_timeout: Duration,
    pub separation_concurrency: usize,
    pub interval_ordering: IntervalOrdering,
    pub session_isolation: bool,
    pub max_file_age: Duration,
    pub sweep_interval: Duration,
    pub purge_on_shutdown: bool,
    pub max_upload_bytes: usize,
    pub credential: CredentialSource,
}

impl ServiceConfig {
    pub fn from_toml(toml: &TomlConfig, workspace: PathBuf) -> Self {
        let pipeline = &toml.pipeline;
        let retention = &toml.retention;

        Self {
            workspace,
            sample_rate: pipeline.sample_rate,
            segment_seconds: pipeline.segment_seconds,
            target_dbfs: pipeline.target_dbfs,
            model_timeout: Duration::from_secs(pipeline.model_timeout_secs.max(1)),
            separation_concurrency: pipeline.separation_concurrency.max(1),
            interval_ordering: if pipeline.sort_speaker_intervals {
                IntervalOrdering::ByStart
            } else {
                IntervalOrdering::AsReturned
            },
            session_isolation: pipeline.session_isolation,
            max_file_age: Duration::from_secs(retention.max_age_hours * 3600),
            sweep_interval: Duration::from_secs(retention.sweep_interval_minutes.max(1) * 60),
            purge_on_shutdown: retention.purge_on_shutdown,
            max_upload_bytes: toml.server.max_upload_mb.saturating_mul(1024 * 1024),
            credential: CredentialSource::new(toml.diarization_token.clone()),
        }
    }

    /// Compiled defaults rooted at `workspace`
    pub fn for_workspace(workspace: PathBuf) -> Self {
        Self::from_toml(&TomlConfig::default(), workspace)
    }
}

/// Diarization credential
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Accept a token of at least [`MIN_TOKEN_LEN`] characters
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (trimmed.len() >= MIN_TOKEN_LEN).then(|| Self(trimmed.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("Diarization credential missing: set HUGGINGFACE_TOKEN or diarization_token")]
    Missing,

    #[error("Diarization credential in {origin} is invalid")]
    Invalid { origin: &'static str },
}

/// Where the credential is looked up, at call time
#[derive(Clone)]
pub struct CredentialSource {
    fallback: Option<String>,
}

impl CredentialSource {
    pub fn new(fallback: Option<String>) -> Self {
        Self { fallback }
    }

    /// Environment first, then the configured fallback
    pub fn resolve(&self) -> Result<AccessToken, CredentialError> {
        let from_env = std::env::var(TOKEN_ENV_VAR).ok().filter(|v| !v.trim().is_empty());

        let (raw, origin) = match (from_env, &self.fallback) {
            (Some(raw), _) => (raw, TOKEN_ENV_VAR),
            (None, Some(raw)) => (raw.clone(), "diarization_token"),
            (None, None) => return Err(CredentialError::Missing),
        };

        AccessToken::parse(&raw).ok_or(CredentialError::Invalid { origin })
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialSource")
            .field("env_var", &TOKEN_ENV_VAR)
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}
