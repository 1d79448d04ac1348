//! Diarization backends

use super::process::run_model;
use super::{DiarizationService, ModelError};
use crate::config::{AccessToken, TOKEN_ENV_VAR};
use crate::models::SpeakerTurn;
use async_trait::async_trait;
use std::path::Path;
use stemdesk_common::config::ModelCommand;
use tracing::debug;

/// Runs `<program> <args..> <audio>` with the token exported
///
/// The program prints a JSON array of `{"start", "end", "speaker"}` objects.
pub struct CommandDiarizer {
    command: ModelCommand,
}

impl CommandDiarizer {
    pub fn new(command: ModelCommand) -> Self {
        Self { command }
    }
}

#[async_trait]
impl DiarizationService for CommandDiarizer {
    async fn diarize(&self, audio: &Path, token: &AccessToken) -> Result<Vec<SpeakerTurn>, ModelError> {
        if !audio.exists() {
            return Err(ModelError::FileNotFound(audio.display().to_string()));
        }

        let stdout = run_model(
            &self.command,
            [audio.as_os_str()],
            Some((TOKEN_ENV_VAR, token.expose())),
        )
        .await?;

        parse_turns(&stdout)
    }
}

/// POSTs the WAV bytes to a diarization service with a bearer token
pub struct HttpDiarizer {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDiarizer {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl DiarizationService for HttpDiarizer {
    async fn diarize(&self, audio: &Path, token: &AccessToken) -> Result<Vec<SpeakerTurn>, ModelError> {
        let body = match tokio::fs::read(audio).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ModelError::FileNotFound(audio.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        debug!(endpoint = %self.endpoint, bytes = body.len(), "Posting audio for diarization");

        let turns = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token.expose())
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<SpeakerTurn>>()
            .await?;

        Ok(turns)
    }
}

/// Used when no diarization backend is configured
pub struct DisabledDiarizer;

#[async_trait]
impl DiarizationService for DisabledDiarizer {
    async fn diarize(&self, _audio: &Path, _token: &AccessToken) -> Result<Vec<SpeakerTurn>, ModelError> {
        Err(ModelError::NotConfigured("Diarization"))
    }
}

fn parse_turns(stdout: &str) -> Result<Vec<SpeakerTurn>, ModelError> {
    serde_json::from_str(stdout.trim()).map_err(|e| ModelError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_turns_keeps_service_order() {
        let turns = parse_turns(
            r#"[
                {"start": 4.0, "end": 5.0, "speaker": "SPEAKER_01"},
                {"start": 0.0, "end": 1.5, "speaker": "SPEAKER_00"}
            ]"#,
        )
        .unwrap();

        assert_eq!(turns[0].speaker, "SPEAKER_01");
        assert_eq!(turns[1].start, 0.0);
    }

    #[test]
    fn test_parse_turns_empty_array() {
        assert!(parse_turns("[]\n").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_backend_reports_not_configured() {
        let token = AccessToken::parse("hf_0123456789").unwrap();
        let err = DisabledDiarizer
            .diarize(Path::new("vocal.wav"), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, ModelError::NotConfigured(_)));
    }
}
