//! HTTP API handlers for stemdesk-sp
//!
//! Upload, speaker separation, artifact download and inspection routes. Every artifact
//! route accepts `?session=<uuid>` to address a session-scoped workspace.

pub mod files;
pub mod health;
pub mod speakers;
pub mod ui;
pub mod upload;

pub use files::file_routes;
pub use health::health_routes;
pub use speakers::speaker_routes;
pub use ui::ui_routes;
pub use upload::upload_routes;

use crate::error::{ApiError, ApiResult};
use crate::models::Scope;
use crate::AppState;
use serde::Deserialize;
use uuid::Uuid;

/// `?session=<uuid>` query parameter
#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    pub session: Option<Uuid>,
}

impl ScopeQuery {
    pub fn scope(&self) -> Scope {
        Scope::from_query(self.session)
    }
}

/// Remember server-side failures for `/health`
pub(crate) async fn track<T>(state: &AppState, result: ApiResult<T>) -> ApiResult<T> {
    if let Err(err) = &result {
        if err.status().is_server_error() {
            tracing::error!("{}", err);
            *state.last_error.write().await = Some(err.to_string());
        }
    }
    result
}

pub(crate) fn task_failed(e: tokio::task::JoinError) -> ApiError {
    ApiError::Internal(format!("Blocking task failed: {}", e))
}
