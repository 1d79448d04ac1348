//! stemdesk-sp library interface
//!
//! Source separation service: segment an upload, separate every chunk into bass, vocal,
//! drum and music stems, reassemble and denoise each stem, and split the vocal by speaker
//! on demand.

pub mod api;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};

use axum::{extract::DefaultBodyLimit, Router};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use crate::collaborators::Collaborators;
use crate::config::ServiceConfig;
use crate::services::{ArtifactStore, Normalizer, SegmentError, SpeakerSplitter};
use crate::workflow::{ScopeLocks, SeparationPipeline};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    /// Workspace rooted at `<root>/uploads`
    pub store: ArtifactStore,
    pub pipeline: Arc<SeparationPipeline>,
    pub speakers: Arc<SpeakerSplitter>,
    pub normalizer: Normalizer,
    /// Serializes every mutation of one scope
    pub locks: ScopeLocks,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last server-side error for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(config: ServiceConfig, collaborators: Collaborators) -> Result<Self, SegmentError> {
        let store = ArtifactStore::new(config.workspace.clone());
        let pipeline = SeparationPipeline::new(&config, store.clone(), &collaborators)?;
        let speakers = SpeakerSplitter::new(
            collaborators.diarization.clone(),
            config.credential.clone(),
            config.interval_ordering,
            config.model_timeout,
        );

        Ok(Self {
            normalizer: Normalizer::new(config.target_dbfs),
            config: Arc::new(config),
            store,
            pipeline: Arc::new(pipeline),
            speakers: Arc::new(speakers),
            locks: ScopeLocks::new(),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        // UI routes (HTML pages)
        .merge(api::ui_routes())
        // API routes
        .merge(api::upload_routes())
        .merge(api::speaker_routes())
        .merge(api::file_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
