//! Per-id lock table
//!
//! Provides [`LockTable`], one async mutex per resource id. Holders of the
//! same id run one at a time; different ids never contend.

use dashmap::DashMap;
use infodoc_artifact::ResourceId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held lock on one resource id
pub type ResourceGuard = OwnedMutexGuard<()>;

/// Lazily populated map of per-id mutexes
#[derive(Debug, Default)]
pub struct LockTable {
    locks: DashMap<ResourceId, Arc<Mutex<()>>>,
}

impl LockTable {
    /// Empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`
    pub async fn lock(&self, id: &ResourceId) -> ResourceGuard {
        // Clone the Arc out so the shard lock is not held across the await.
        let mutex = self
            .locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }

    /// Drop the entry for `id` if nobody holds or waits on it
    pub fn release_idle(&self, id: &ResourceId) {
        self.locks
            .remove_if(id, |_, mutex| Arc::strong_count(mutex) == 1);
    }

    /// Number of ids with an entry
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Check if the table has no entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
