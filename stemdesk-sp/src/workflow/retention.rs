//! Age-based workspace retention

use super::ScopeLocks;
use crate::models::Scope;
use crate::services::ArtifactStore;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// What one sweep removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub files: usize,
    pub sessions: usize,
}

/// Evict old top-level files and stale session directories
///
/// Each scope is swept under its own lock. Failures are logged, never returned.
pub async fn run_sweep(store: ArtifactStore, locks: ScopeLocks, max_age: Duration) -> SweepSummary {
    let mut summary = SweepSummary::default();

    {
        let _guard = locks.acquire(Scope::Shared).await;
        match store.evict_older_than(Scope::Shared, max_age) {
            Ok(removed) => summary.files = removed.len(),
            Err(e) => warn!("Workspace sweep failed: {}", e),
        }
    }

    let stale = match store.stale_sessions(max_age) {
        Ok(stale) => stale,
        Err(e) => {
            warn!("Session sweep failed: {}", e);
            return summary;
        }
    };

    for id in stale {
        let scope = Scope::Session(id);
        let guard = locks.acquire(scope).await;
        match store.remove_session(id) {
            Ok(()) => summary.sessions += 1,
            Err(e) => warn!(session = %id, "Failed to remove stale session: {}", e),
        }
        drop(guard);
        locks.forget(scope).await;
    }

    if summary != SweepSummary::default() {
        info!(files = summary.files, sessions = summary.sessions, "Retention sweep");
    }
    summary
}

/// Sweep every `interval` until the task is aborted
pub fn spawn_periodic_sweep(
    store: ArtifactStore,
    locks: ScopeLocks,
    max_age: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            run_sweep(store.clone(), locks.clone(), max_age).await;
        }
    })
}
