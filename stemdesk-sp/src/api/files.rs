//! Artifact download and inspection endpoints

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::path::Path as FsPath;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::{task_failed, track, ScopeQuery};
use crate::error::ApiResult;
use crate::services::audio_io::{load_native, probe_wav, AudioIoError, WavInfo};
use crate::AppState;

/// Normalize response
#[derive(Debug, Serialize)]
pub struct NormalizeResponse {
    pub success: bool,
    pub normalized_file: String,
}

/// Audio info response
#[derive(Debug, Serialize)]
pub struct AudioInfoResponse {
    pub success: bool,
    pub duration: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Build artifact routes
pub fn file_routes() -> Router<AppState> {
    Router::new()
        .route("/download/:filename", get(download))
        .route("/download_all", get(download_all).post(download_all))
        .route("/normalize/:filename", get(normalize))
        .route("/get_audio_info/:filename", get(audio_info))
}

/// GET /download/:filename
///
/// The scope lock is held only while the file is resolved and opened.
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<Response> {
    let scope = query.scope();
    let file = {
        let _guard = state.locks.acquire(scope).await;
        let path = state.store.resolve(scope, &filename)?;
        tokio::fs::File::open(&path).await?
    };

    debug!(scope = %scope, "Streaming {}", filename);
    Ok(attachment(file, &filename))
}

/// GET|POST /download_all
pub async fn download_all(State(state): State<AppState>, Query(query): Query<ScopeQuery>) -> ApiResult<Response> {
    let result = bundle(&state, query).await;
    track(&state, result).await
}

async fn bundle(state: &AppState, query: ScopeQuery) -> ApiResult<Response> {
    let scope = query.scope();
    let (file, name) = {
        let _guard = state.locks.acquire(scope).await;
        let store = state.store.clone();
        let path = tokio::task::spawn_blocking(move || store.bundle(scope))
            .await
            .map_err(task_failed)??;
        let name = file_name(&path);
        (tokio::fs::File::open(&path).await?, name)
    };

    Ok(attachment(file, &name))
}

/// GET /normalize/:filename
pub async fn normalize(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<Json<NormalizeResponse>> {
    let result = normalize_one(&state, &filename, query).await;
    track(&state, result).await
}

async fn normalize_one(state: &AppState, filename: &str, query: ScopeQuery) -> ApiResult<Json<NormalizeResponse>> {
    let scope = query.scope();
    let _guard = state.locks.acquire(scope).await;
    let path = state.store.resolve(scope, filename)?;

    let normalizer = state.normalizer;
    let artifact = tokio::task::spawn_blocking(move || normalizer.normalize(&path))
        .await
        .map_err(task_failed)??;

    Ok(Json(NormalizeResponse {
        success: true,
        normalized_file: file_name(&artifact.path),
    }))
}

/// GET /get_audio_info/:filename
pub async fn audio_info(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<Json<AudioInfoResponse>> {
    let scope = query.scope();
    let path = {
        let _guard = state.locks.acquire(scope).await;
        state.store.resolve(scope, &filename)?
    };

    let info = tokio::task::spawn_blocking(move || inspect(&path))
        .await
        .map_err(task_failed)??;

    Ok(Json(AudioInfoResponse {
        success: true,
        duration: info.duration_seconds,
        sample_rate: info.sample_rate,
        channels: info.channels,
    }))
}

/// WAV header first, full decode for other containers
fn inspect(path: &FsPath) -> Result<WavInfo, AudioIoError> {
    match probe_wav(path) {
        Ok(info) => Ok(info),
        Err(AudioIoError::Malformed { .. }) => {
            let asset = load_native(path)?;
            Ok(WavInfo {
                frames: asset.frames() as u32,
                sample_rate: asset.sample_rate,
                channels: asset.channels,
                duration_seconds: asset.duration_seconds(),
            })
        }
        Err(e) => Err(e),
    }
}

fn file_name(path: &FsPath) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn content_type(name: &str) -> &'static str {
    match name.rsplit('.').next().map(|ext| ext.to_ascii_lowercase()).as_deref() {
        Some("wav") => "audio/wav",
        Some("zip") => "application/zip",
        Some("mp3") => "audio/mpeg",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    }
}

fn attachment(file: tokio::fs::File, name: &str) -> Response {
    let body = Body::from_stream(ReaderStream::new(file));
    (
        [
            (header::CONTENT_TYPE, content_type(name).to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name),
            ),
        ],
        body,
    )
        .into_response()
}
