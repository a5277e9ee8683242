//! Resource store facade
//!
//! [`ResourceStore`] pairs a [`ResourceBackend`] with a [`LockTable`].
//! Every write for an id runs inside that id's critical section: the
//! current state is loaded, the candidate built, and the result persisted
//! before the next writer for the same id is let in.

use crate::backend::{BackendError, ResourceBackend};
use crate::locks::LockTable;
use infodoc_artifact::{ContentHash, HashError, Resource, ResourceId};
use std::convert::Infallible;
use std::sync::Arc;

/// Replace outcome label for `infodoc_replace_total`
mod outcome {
    pub(super) const OK: &str = "ok";
    pub(super) const REJECTED: &str = "rejected";
    pub(super) const CONFLICT: &str = "conflict";
    pub(super) const NOT_FOUND: &str = "not_found";
    pub(super) const ERROR: &str = "error";
}

/// Store behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreConfig {
    /// Reject replaces whose expected revision is stale
    pub optimistic_concurrency: bool,
}

impl StoreConfig {
    /// Enable or disable revision checks on replace
    #[inline]
    #[must_use]
    pub fn with_optimistic_concurrency(mut self, enabled: bool) -> Self {
        self.optimistic_concurrency = enabled;
        self
    }
}

/// A resource together with its revision
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Stored resource
    pub resource: Resource,
    /// BLAKE3 revision of the stored form
    pub revision: ContentHash,
}

impl Snapshot {
    fn of(resource: Resource) -> Result<Self, StoreError> {
        let revision = resource.revision()?;
        Ok(Self { resource, revision })
    }
}

/// Concurrency-safe resource store
#[derive(Debug)]
pub struct ResourceStore {
    backend: Arc<dyn ResourceBackend>,
    locks: LockTable,
    config: StoreConfig,
}

impl ResourceStore {
    /// Store over `backend` with default config
    #[must_use]
    pub fn new(backend: Arc<dyn ResourceBackend>) -> Self {
        Self {
            backend,
            locks: LockTable::new(),
            config: StoreConfig::default(),
        }
    }

    /// Set behaviour switches
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: StoreConfig) -> Self {
        self.config = config;
        self
    }

    /// Behaviour switches in force
    #[inline]
    #[must_use]
    pub fn config(&self) -> StoreConfig {
        self.config
    }

    /// Backend name
    #[inline]
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Fetch the last committed state of a resource
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] for unknown ids, or a backend error
    pub async fn get(&self, id: &ResourceId) -> Result<Snapshot, StoreError> {
        let resource = self
            .backend
            .load(id)
            .await?
            .ok_or_else(|| StoreError::NotFound { id: id.clone() })?;
        Snapshot::of(resource)
    }

    /// All resources ordered by id
    ///
    /// # Errors
    /// Returns error if the backend fails
    pub async fn list(&self) -> Result<Vec<Snapshot>, StoreError> {
        let ids = self.backend.ids().await?;
        let mut snapshots = Vec::with_capacity(ids.len());
        for id in ids {
            // A resource listed but gone by the time it is read is skipped.
            if let Some(resource) = self.backend.load(&id).await? {
                snapshots.push(Snapshot::of(resource)?);
            }
        }
        Ok(snapshots)
    }

    /// Create a resource that does not exist yet
    ///
    /// # Errors
    /// Returns [`StoreError::AlreadyExists`] if the id is taken
    pub async fn insert(&self, resource: Resource) -> Result<Snapshot, StoreError> {
        let id = resource.id().clone();
        let _guard = self.locks.lock(&id).await;
        if self.backend.load(&id).await?.is_some() {
            return Err(StoreError::AlreadyExists { id });
        }
        self.backend.save(&resource).await?;
        tracing::info!(resource = %id, backend = self.backend.name(), "resource created");
        Snapshot::of(resource)
    }

    /// Replace a resource with a fully built candidate
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`], [`StoreError::IdMismatch`],
    /// [`StoreError::Conflict`], or a backend error
    pub async fn replace(
        &self,
        id: &ResourceId,
        candidate: Resource,
        expected: Option<ContentHash>,
    ) -> Result<Snapshot, StoreError> {
        self.replace_with(id, expected, |_| Ok::<_, Infallible>(candidate))
            .await
            .map_err(|e| match e {
                ReplaceError::Store(e) => e,
                ReplaceError::Rejected(never) => match never {},
            })
    }

    /// Build and persist a replacement inside the id's critical section
    ///
    /// `build` sees the last committed state. If it fails, nothing is
    /// written and its error is returned as [`ReplaceError::Rejected`].
    ///
    /// # Errors
    /// Returns a store error, or the rejection produced by `build`
    pub async fn replace_with<F, E>(
        &self,
        id: &ResourceId,
        expected: Option<ContentHash>,
        build: F,
    ) -> Result<Snapshot, ReplaceError<E>>
    where
        F: FnOnce(&Resource) -> Result<Resource, E>,
        E: std::error::Error + 'static,
    {
        let guard = self.locks.lock(id).await;
        let result = self.replace_locked(id, expected, build).await;
        drop(guard);

        let label = match &result {
            Ok(_) => outcome::OK,
            Err(ReplaceError::Rejected(_)) => outcome::REJECTED,
            Err(ReplaceError::Store(StoreError::Conflict { .. })) => outcome::CONFLICT,
            Err(ReplaceError::Store(StoreError::NotFound { .. })) => {
                self.locks.release_idle(id);
                outcome::NOT_FOUND
            }
            Err(ReplaceError::Store(_)) => outcome::ERROR,
        };
        metrics::counter!("infodoc_replace_total", "outcome" => label).increment(1);
        result
    }

    async fn replace_locked<F, E>(
        &self,
        id: &ResourceId,
        expected: Option<ContentHash>,
        build: F,
    ) -> Result<Snapshot, ReplaceError<E>>
    where
        F: FnOnce(&Resource) -> Result<Resource, E>,
        E: std::error::Error + 'static,
    {
        let current = self.get(id).await?;
        if self.config.optimistic_concurrency {
            if let Some(expected) = expected {
                if expected != current.revision {
                    return Err(StoreError::Conflict {
                        id: id.clone(),
                        expected,
                        actual: current.revision,
                    }
                    .into());
                }
            }
        }

        let candidate = build(&current.resource).map_err(ReplaceError::Rejected)?;
        if candidate.id() != id {
            return Err(StoreError::IdMismatch {
                expected: id.clone(),
                actual: candidate.id().clone(),
            }
            .into());
        }

        self.backend
            .save(&candidate)
            .await
            .map_err(StoreError::from)?;
        let snapshot = Snapshot::of(candidate)?;
        let decoded = snapshot.resource.documents_decoded_len();
        metrics::counter!("infodoc_attachment_bytes_total").increment(decoded as u64);
        tracing::info!(
            resource = %id,
            revision = %snapshot.revision.short(),
            documents = snapshot.resource.documents().len(),
            decoded_bytes = decoded,
            "resource replaced"
        );
        Ok(snapshot)
    }
}

/// Store failure
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No resource with this id
    #[error("resource {id} not found")]
    NotFound { id: ResourceId },

    /// Insert of an id that is already stored
    #[error("resource {id} already exists")]
    AlreadyExists { id: ResourceId },

    /// Expected revision is stale
    #[error("resource {id} changed: expected revision {expected}, found {actual}")]
    Conflict {
        id: ResourceId,
        expected: ContentHash,
        actual: ContentHash,
    },

    /// Candidate carries a different id than the one addressed
    #[error("candidate id {actual} does not match {expected}")]
    IdMismatch {
        expected: ResourceId,
        actual: ResourceId,
    },

    /// Revision could not be computed
    #[error(transparent)]
    Revision(#[from] HashError),

    /// Persistence failure
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Failure of [`ResourceStore::replace_with`]
#[derive(Debug, thiserror::Error)]
pub enum ReplaceError<E> {
    /// Store-level failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Candidate builder refused the replace
    #[error(transparent)]
    Rejected(E),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    #[error("nope")]
    struct Nope;

    fn id(s: &str) -> ResourceId {
        ResourceId::new(s).unwrap()
    }

    async fn seeded() -> ResourceStore {
        let store = ResourceStore::new(Arc::new(MemoryBackend::new()));
        store.insert(Resource::new(id("1"))).await.unwrap();
        store
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let store = seeded().await;
        let err = store.get(&id("2")).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn insert_twice_fails() {
        let store = seeded().await;
        let err = store.insert(Resource::new(id("1"))).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn replace_is_visible_to_get() {
        let store = seeded().await;
        let candidate = Resource::new(id("1")).with_field("heroText", json!("hi"));
        let written = store.replace(&id("1"), candidate.clone(), None).await.unwrap();
        let read = store.get(&id("1")).await.unwrap();
        assert_eq!(read.resource, candidate);
        assert_eq!(read.revision, written.revision);
    }

    #[tokio::test]
    async fn rejected_build_leaves_state() {
        let store = seeded().await;
        let before = store.get(&id("1")).await.unwrap();
        let err = store
            .replace_with(&id("1"), None, |_| Err::<Resource, _>(Nope))
            .await
            .unwrap_err();
        assert!(matches!(err, ReplaceError::Rejected(Nope)));
        assert_eq!(store.get(&id("1")).await.unwrap(), before);
    }

    #[tokio::test]
    async fn candidate_id_must_match() {
        let store = seeded().await;
        let err = store
            .replace(&id("1"), Resource::new(id("2")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::IdMismatch { .. }));
    }

    #[tokio::test]
    async fn stale_revision_ignored_by_default() {
        let store = seeded().await;
        let stale = ContentHash::compute(b"stale");
        assert!(store
            .replace(&id("1"), Resource::new(id("1")), Some(stale))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn stale_revision_conflicts_when_enabled() {
        let store = seeded()
            .await
            .with_config(StoreConfig::default().with_optimistic_concurrency(true));
        let current = store.get(&id("1")).await.unwrap().revision;
        let stale = ContentHash::compute(b"stale");
        let err = store
            .replace(&id("1"), Resource::new(id("1")), Some(stale))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { actual, .. } if actual == current));
        assert!(store
            .replace(&id("1"), Resource::new(id("1")), Some(current))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn list_is_ordered() {
        let store = seeded().await;
        store.insert(Resource::new(id("0"))).await.unwrap();
        let ids: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.resource.id().to_string())
            .collect();
        assert_eq!(ids, vec!["0", "1"]);
    }

    #[tokio::test]
    async fn replace_unknown_leaves_no_lock_entry() {
        let store = seeded().await;
        let tracked = store.locks.len();
        let err = store
            .replace_with(&id("2"), None, |_| Ok::<_, Nope>(Resource::new(id("2"))))
            .await
            .unwrap_err();
        assert!(matches!(err, ReplaceError::Store(StoreError::NotFound { .. })));
        assert_eq!(store.locks.len(), tracked);
        assert!(matches!(
            store.get(&id("2")).await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
