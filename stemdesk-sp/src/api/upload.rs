//! Upload endpoint
//!
//! `POST /` and `POST /upload` accept one multipart `file` field, store it in the
//! request's scope and run the separation pipeline synchronously.

use axum::{
    extract::{multipart::Field, Multipart, Query, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

use super::{track, ScopeQuery};
use crate::error::{ApiError, ApiResult};
use crate::models::{ChunkFailure, ComponentLabel, Scope};
use crate::services::audio_io::partial_path;
use crate::workflow::retention::run_sweep;
use crate::AppState;

/// Upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    /// Denoised artifacts that are available for download
    pub files: Vec<String>,
    /// Every component with its artifact name, or null when it failed
    pub components: BTreeMap<ComponentLabel, Option<String>>,
    pub total_chunks: usize,
    pub succeeded_chunks: usize,
    pub failed_chunks: Vec<ChunkFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(upload))
        .route("/upload", post(upload))
}

/// POST /upload
pub async fn upload(
    State(state): State<AppState>,
    Query(query): Query<ScopeQuery>,
    multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let result = process_upload(&state, query, multipart).await;
    track(&state, result).await
}

async fn process_upload(
    state: &AppState,
    query: ScopeQuery,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    let scope = match query.session {
        Some(id) => Scope::Session(id),
        None if state.config.session_isolation => Scope::Session(Uuid::new_v4()),
        None => Scope::Shared,
    };

    run_sweep(state.store.clone(), state.locks.clone(), state.config.max_file_age).await;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        return store_and_run(state, scope, &mut field).await;
    }

    Err(ApiError::Rejected {
        code: "NO_FILE_PART",
        message: "No file part".to_string(),
    })
}

async fn store_and_run(state: &AppState, scope: Scope, field: &mut Field<'_>) -> ApiResult<Json<UploadResponse>> {
    let file_name = field.file_name().unwrap_or_default().trim().to_string();
    if file_name.is_empty() {
        return Err(ApiError::Rejected {
            code: "NO_SELECTED_FILE",
            message: "No selected file".to_string(),
        });
    }

    let _guard = state.locks.acquire(scope).await;

    state.store.ensure_dir(scope)?;
    let upload_path = state.store.upload_path(scope, &file_name);
    let written = save_field(field, &upload_path).await?;
    if written == 0 {
        if let Err(e) = tokio::fs::remove_file(&upload_path).await {
            warn!("Failed to remove empty upload {}: {}", upload_path.display(), e);
        }
        return Err(ApiError::Rejected {
            code: "EMPTY_FILE",
            message: "Uploaded file is empty".to_string(),
        });
    }
    info!(scope = %scope, bytes = written, "Stored upload {}", upload_path.display());

    let report = state.pipeline.run(scope, &upload_path).await?;

    Ok(Json(UploadResponse {
        success: true,
        files: report.available_files(),
        total_chunks: report.total_chunks,
        succeeded_chunks: report.succeeded_chunks.len(),
        failed_chunks: report.failed_chunks,
        components: report.components,
        session_id: scope.session_id(),
    }))
}

/// Stream a multipart field to `path` through its `.partial` name
async fn save_field(field: &mut Field<'_>, path: &Path) -> ApiResult<u64> {
    let partial: PathBuf = partial_path(path);
    let mut file = tokio::fs::File::create(&partial).await?;
    let mut written = 0u64;

    loop {
        match field.chunk().await {
            Ok(Some(bytes)) => {
                file.write_all(&bytes).await?;
                written += bytes.len() as u64;
            }
            Ok(None) => break,
            Err(e) => {
                drop(file);
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    warn!("Failed to remove {}: {}", partial.display(), cleanup);
                }
                return Err(ApiError::BadRequest(e.body_text()));
            }
        }
    }

    file.flush().await?;
    drop(file);
    tokio::fs::rename(&partial, path).await?;
    Ok(written)
}
