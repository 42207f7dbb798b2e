//! Backend Location Registry
//!
//! Process-local record of which backend device serves a share. The
//! registry is the only shared mutable state of a driver and is rebuilt
//! lazily through `ensure_share` after a restart.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Share identifier to backend device mapping
#[derive(Debug, Default)]
pub struct BackendRegistry {
    entries: DashMap<String, String>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `backend` serves `share_id`
    pub fn remember(&self, share_id: &str, backend: &str) {
        debug!("Remembering share {} on {}", share_id, backend);
        self.entries.insert(share_id.to_string(), backend.to_string());
    }

    /// Drop the mapping of `share_id`; unknown ids are ignored
    pub fn forget(&self, share_id: &str) {
        if self.entries.remove(share_id).is_some() {
            debug!("Forgot share {}", share_id);
        }
    }

    pub fn lookup(&self, share_id: &str) -> Option<String> {
        self.entries.get(share_id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-share async locks serializing access-rule mutations
///
/// Rule changes are read-modify-write against the controller; holding the
/// share's lock across the whole cycle keeps concurrent calls in this process
/// from overwriting each other.
#[derive(Debug, Default)]
pub struct ShareLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ShareLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, share_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(share_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
