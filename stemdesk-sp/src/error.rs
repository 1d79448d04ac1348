//! Error taxonomy and HTTP mapping
//!
//! Domain errors are classified as input problems, isolated stage failures, empty
//! results or I/O failures. At the HTTP boundary every error becomes
//! `{"success": false, "error": <message>, "code": <CODE>}` with status 400, 404 or 500.

use crate::collaborators::ModelError;
use crate::services::audio_io::AudioIoError;
use crate::services::{NormalizeError, SegmentError, SpeakerSplitError, StoreError};
use crate::workflow::PipelineError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Missing, empty or malformed input, or a missing credential
    Input,
    /// One chunk or component failed and could not be recovered locally
    StageFailure,
    /// All chunks failed, or no speakers were detected
    EmptyResult,
    /// Disk or task failure
    Io,
}

impl PipelineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            PipelineError::Input(_) => ErrorClass::Input,
            PipelineError::Segment(SegmentError::EmptySource) => ErrorClass::Input,
            PipelineError::Segment(SegmentError::InvalidDuration(_)) => ErrorClass::StageFailure,
            PipelineError::Segment(SegmentError::NoSegments) => ErrorClass::Io,
            PipelineError::NoSurvivingChunks { .. } | PipelineError::NoMergedComponents => ErrorClass::EmptyResult,
            PipelineError::Store(_) | PipelineError::Task { .. } => ErrorClass::Io,
        }
    }
}

impl SpeakerSplitError {
    pub fn class(&self) -> ErrorClass {
        match self {
            SpeakerSplitError::Credential(_)
            | SpeakerSplitError::VocalNotFound(_)
            | SpeakerSplitError::VocalEmpty(_)
            | SpeakerSplitError::VocalMalformed(_) => ErrorClass::Input,
            SpeakerSplitError::Diarization(_) => ErrorClass::StageFailure,
            SpeakerSplitError::Write(_)
            | SpeakerSplitError::Store(_)
            | SpeakerSplitError::Task(_)
            | SpeakerSplitError::Io(_) => ErrorClass::Io,
        }
    }
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Artifact not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Input rejected with a specific code (400)
    #[error("{message}")]
    Rejected { code: &'static str, message: String },

    /// Nothing usable came out of a stage (400)
    #[error("{message}")]
    EmptyResult { code: &'static str, message: String },

    /// A stage failed outright (500)
    #[error("{message}")]
    StageFailure { code: &'static str, message: String },

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Rejected { .. } | ApiError::EmptyResult { .. } => {
                StatusCode::BAD_REQUEST
            }
            ApiError::StageFailure { .. } | ApiError::Internal(_) | ApiError::Io(_) | ApiError::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code_and_message(&self) -> (&'static str, String) {
        match self {
            ApiError::NotFound(msg) => ("NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => ("BAD_REQUEST", msg.clone()),
            ApiError::Rejected { code, message }
            | ApiError::EmptyResult { code, message }
            | ApiError::StageFailure { code, message } => (*code, message.clone()),
            ApiError::Internal(msg) => ("INTERNAL_ERROR", msg.clone()),
            ApiError::Io(err) => ("IO_ERROR", err.to_string()),
            ApiError::Other(err) => ("INTERNAL_ERROR", err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = self.code_and_message();

        let body = Json(json!({
            "success": false,
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(name) => ApiError::NotFound(format!("File not found: {}", name)),
            StoreError::NothingToBundle => ApiError::NotFound(err.to_string()),
            StoreError::InvalidName(_) => ApiError::Rejected {
                code: "INVALID_FILENAME",
                message: err.to_string(),
            },
            StoreError::Archive(msg) => ApiError::Internal(msg),
            StoreError::Io(e) => ApiError::Io(e),
        }
    }
}

impl From<AudioIoError> for ApiError {
    fn from(err: AudioIoError) -> Self {
        match err {
            AudioIoError::NotFound(path) => ApiError::NotFound(format!("File not found: {}", path.display())),
            AudioIoError::Malformed { .. } => ApiError::Rejected {
                code: "MALFORMED_AUDIO",
                message: err.to_string(),
            },
            AudioIoError::Io(e) => ApiError::Io(e),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<NormalizeError> for ApiError {
    fn from(err: NormalizeError) -> Self {
        match err {
            NormalizeError::Audio(e) => e.into(),
            NormalizeError::InvalidName(_) => ApiError::Rejected {
                code: "INVALID_FILENAME",
                message: err.to_string(),
            },
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match (err.class(), err) {
            (_, PipelineError::NoSurvivingChunks { .. }) => ApiError::EmptyResult {
                code: "NO_SURVIVING_CHUNKS",
                message,
            },
            (ErrorClass::EmptyResult, _) => ApiError::EmptyResult {
                code: "NO_MERGED_COMPONENTS",
                message,
            },
            (ErrorClass::Input, _) => ApiError::Rejected {
                code: "INVALID_AUDIO",
                message,
            },
            (ErrorClass::StageFailure, _) => ApiError::StageFailure {
                code: "PIPELINE_FAILED",
                message,
            },
            (ErrorClass::Io, _) => ApiError::Internal(message),
        }
    }
}

impl From<SpeakerSplitError> for ApiError {
    fn from(err: SpeakerSplitError) -> Self {
        let message = err.to_string();
        match err {
            SpeakerSplitError::VocalNotFound(_) => {
                ApiError::NotFound("Vocal file not found. Please separate the audio first.".to_string())
            }
            SpeakerSplitError::VocalEmpty(_) => ApiError::Rejected {
                code: "EMPTY_FILE",
                message: "Vocal file is empty.".to_string(),
            },
            SpeakerSplitError::VocalMalformed(_) => ApiError::Rejected {
                code: "MALFORMED_AUDIO",
                message,
            },
            SpeakerSplitError::Credential(_) => ApiError::Rejected {
                code: "CREDENTIAL_ERROR",
                message,
            },
            SpeakerSplitError::Diarization(ModelError::NotConfigured(_)) => ApiError::StageFailure {
                code: "DIARIZATION_UNAVAILABLE",
                message,
            },
            SpeakerSplitError::Diarization(_) => ApiError::StageFailure {
                code: "DIARIZATION_FAILED",
                message,
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
