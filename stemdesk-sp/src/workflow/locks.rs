//! Per-scope serialization of workspace mutations

use crate::models::Scope;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per scope
///
/// Pipeline runs, speaker splits, normalization, bundling and eviction of a scope all
/// hold its guard, so deletions never race reads of the same files.
#[derive(Clone, Default)]
pub struct ScopeLocks {
    inner: Arc<Mutex<HashMap<Scope, Arc<Mutex<()>>>>>,
}

impl ScopeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, scope: Scope) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.inner.lock().await;
            locks.entry(scope).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drop the lock entry of a removed session
    ///
    /// The entry stays while any task still holds or awaits it, so a later `acquire`
    /// cannot mint a second mutex for the same scope. Returns whether it was removed.
    pub async fn forget(&self, scope: Scope) -> bool {
        let mut locks = self.inner.lock().await;
        let idle = locks.get(&scope).is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(&scope);
        }
        idle
    }
}
