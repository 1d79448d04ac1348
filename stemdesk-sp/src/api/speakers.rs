//! Speaker separation endpoint

use axum::{
    extract::{Query, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

use super::{task_failed, track, ScopeQuery};
use crate::error::{ApiError, ApiResult};
use crate::models::ComponentLabel;
use crate::AppState;

/// Speaker separation response
#[derive(Debug, Serialize)]
pub struct SpeakerResponse {
    pub success: bool,
    /// `speaker_<label>` → normalized file name
    pub speaker_files: BTreeMap<String, String>,
}

/// Build speaker routes
pub fn speaker_routes() -> Router<AppState> {
    Router::new().route("/separate_speakers", post(separate_speakers))
}

/// POST /separate_speakers
///
/// Diarizes the scope's denoised vocal, writes one track per speaker, then normalizes
/// the speaker tracks together with the four denoised components.
pub async fn separate_speakers(
    State(state): State<AppState>,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<Json<SpeakerResponse>> {
    let result = process(&state, query).await;
    track(&state, result).await
}

async fn process(state: &AppState, query: ScopeQuery) -> ApiResult<Json<SpeakerResponse>> {
    let scope = query.scope();
    let _guard = state.locks.acquire(scope).await;

    let vocal = state.store.denoised_path(scope, ComponentLabel::Vocal);
    let tracks = state.speakers.split(&vocal, &state.store.speakers_dir(scope)).await?;

    if tracks.is_empty() {
        info!(scope = %scope, "No speakers detected");
        return Err(ApiError::EmptyResult {
            code: "NO_SPEAKERS",
            message: "No speakers detected in the audio.".to_string(),
        });
    }

    let components: Vec<PathBuf> = ComponentLabel::ALL
        .into_iter()
        .map(|label| state.store.denoised_path(scope, label))
        .filter(|path| path.is_file())
        .collect();
    let speakers: Vec<(String, PathBuf)> = tracks
        .into_iter()
        .map(|(key, track)| (key.to_string(), track.path))
        .collect();

    let normalizer = state.normalizer;
    let speaker_files = tokio::task::spawn_blocking(move || -> ApiResult<BTreeMap<String, String>> {
        for path in &components {
            if let Err(e) = normalizer.normalize(path) {
                warn!("Failed to normalize {}: {}", path.display(), e);
            }
        }

        let mut files = BTreeMap::new();
        for (key, path) in speakers {
            let artifact = normalizer.normalize(&path)?;
            let name = artifact
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| ApiError::Internal(format!("Unnamed artifact {}", artifact.path.display())))?
                .to_string();
            files.insert(key, name);
        }
        Ok(files)
    })
    .await
    .map_err(task_failed)??;

    info!(scope = %scope, speakers = speaker_files.len(), "Speaker separation finished");
    Ok(Json(SpeakerResponse {
        success: true,
        speaker_files,
    }))
}
