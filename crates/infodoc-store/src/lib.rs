//! infodoc Store
//!
//! Concurrency-safe storage of resources.
//!
//! # Core Concepts
//!
//! - [`ResourceStore`]: get / replace / replace_with / insert / list
//! - [`LockTable`]: per-id mutual exclusion, no cross-id locking
//! - [`ResourceBackend`]: persistence seam, with [`MemoryBackend`] and
//!   [`FileBackend`]
//!
//! # Example
//!
//! ```rust,ignore
//! use infodoc_store::{MemoryBackend, ResourceStore};
//! use std::sync::Arc;
//!
//! let store = ResourceStore::new(Arc::new(MemoryBackend::new()));
//! store.insert(Resource::new(id)).await?;
//! let snapshot = store
//!     .replace_with(&id, None, |stored| engine.merge(stored, payload).map(Merged::into_resource))
//!     .await?;
//! ```

#![allow(missing_docs)]

mod backend;
mod locks;
mod store;

pub use backend::{BackendError, FileBackend, MemoryBackend, ResourceBackend, FILE_EXTENSION};
pub use locks::{LockTable, ResourceGuard};
pub use store::{ReplaceError, ResourceStore, Snapshot, StoreConfig, StoreError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
