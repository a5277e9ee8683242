//! Application wiring
//!
//! Builds the store from configuration, seeds it, and holds the shared
//! state handed to every request.

use crate::config::{ServerConfig, StorageConfig};
use infodoc_artifact::{Resource, ResourceId};
use infodoc_composition::MergeEngine;
use infodoc_store::{
    BackendError, FileBackend, MemoryBackend, ResourceBackend, ResourceStore, StoreError,
};
use std::sync::Arc;

/// Shared request state
#[derive(Debug)]
pub struct AppState {
    store: Arc<ResourceStore>,
    engine: MergeEngine,
    resource_type: String,
    body_limit: u64,
}

impl AppState {
    /// State over an existing store
    #[must_use]
    pub fn new(store: Arc<ResourceStore>, config: &ServerConfig) -> Self {
        Self {
            store,
            engine: MergeEngine::new().with_limits(config.limits.size_limits()),
            resource_type: config.resource_type.clone(),
            body_limit: config.limits.body_limit(),
        }
    }

    /// Resource store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    /// Merge engine
    #[inline]
    #[must_use]
    pub fn engine(&self) -> &MergeEngine {
        &self.engine
    }

    /// JSON-LD type of served resources
    #[inline]
    #[must_use]
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Request body ceiling in bytes
    #[inline]
    #[must_use]
    pub fn body_limit(&self) -> u64 {
        self.body_limit
    }
}

/// Open the configured backend
///
/// # Errors
/// Returns error if a file backend directory cannot be created
pub async fn open_backend(storage: &StorageConfig) -> Result<Arc<dyn ResourceBackend>, BackendError> {
    Ok(match storage {
        StorageConfig::Memory => Arc::new(MemoryBackend::new()),
        StorageConfig::File { data_dir } => Arc::new(FileBackend::open(data_dir).await?),
    })
}

/// Create every id in `ids` that is not stored yet
///
/// Returns the number of resources created.
///
/// # Errors
/// Returns error if the backend fails
pub async fn seed(store: &ResourceStore, ids: &[ResourceId]) -> Result<usize, StoreError> {
    let mut created = 0;
    for id in ids {
        match store.insert(Resource::new(id.clone())).await {
            Ok(_) => created += 1,
            Err(StoreError::AlreadyExists { .. }) => {
                tracing::debug!(resource = %id, "seed resource already present");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(created)
}

/// Build the store from configuration and seed it
///
/// # Errors
/// Returns error if the backend cannot be opened or seeding fails
pub async fn build_store(config: &ServerConfig) -> Result<Arc<ResourceStore>, AppError> {
    let backend = open_backend(&config.storage).await?;
    let store = ResourceStore::new(backend).with_config(config.store_config());
    let created = seed(&store, &config.seed_ids).await?;
    tracing::info!(
        backend = store.backend_name(),
        seeded = created,
        "resource store ready"
    );
    Ok(Arc::new(store))
}

/// Startup failure
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Backend could not be opened
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// Seeding failed
    #[error(transparent)]
    Store(#[from] StoreError),
}
