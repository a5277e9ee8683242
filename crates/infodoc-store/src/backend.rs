//! Persistence backends
//!
//! [`ResourceBackend`] is the storage seam of the store. Backends do no
//! locking of their own beyond what keeps a single call consistent; the
//! store serializes writers per id.

use infodoc_artifact::{Resource, ResourceId};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

/// Extension of resource files in a [`FileBackend`] directory
pub const FILE_EXTENSION: &str = "json";

/// Storage for whole resources keyed by id
#[async_trait::async_trait]
pub trait ResourceBackend: Send + Sync + std::fmt::Debug {
    /// Load a resource, `None` if absent
    async fn load(&self, id: &ResourceId) -> Result<Option<Resource>, BackendError>;

    /// Write a resource, replacing any previous version
    async fn save(&self, resource: &Resource) -> Result<(), BackendError>;

    /// All stored ids in ascending order
    async fn ids(&self) -> Result<Vec<ResourceId>, BackendError>;

    /// Backend name for logs
    fn name(&self) -> &'static str;
}

/// In-process backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    resources: RwLock<BTreeMap<ResourceId, Resource>>,
}

impl MemoryBackend {
    /// Empty backend
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored resources
    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.read().len()
    }

    /// Check if nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.read().is_empty()
    }
}

#[async_trait::async_trait]
impl ResourceBackend for MemoryBackend {
    async fn load(&self, id: &ResourceId) -> Result<Option<Resource>, BackendError> {
        Ok(self.resources.read().get(id).cloned())
    }

    async fn save(&self, resource: &Resource) -> Result<(), BackendError> {
        self.resources
            .write()
            .insert(resource.id().clone(), resource.clone());
        Ok(())
    }

    async fn ids(&self) -> Result<Vec<ResourceId>, BackendError> {
        Ok(self.resources.read().keys().cloned().collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// One `<id>.json` file per resource
///
/// Writes go to a temp file in the same directory which is then renamed
/// over the target, so a reader never sees a half-written file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open a directory, creating it if needed
    ///
    /// # Errors
    /// Returns error if the directory cannot be created
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|source| BackendError::io(&dir, source))?;
        Ok(Self { dir })
    }

    /// Backing directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a resource id
    #[must_use]
    pub fn path_for(&self, id: &ResourceId) -> PathBuf {
        self.dir.join(format!("{id}.{FILE_EXTENSION}"))
    }
}

#[async_trait::async_trait]
impl ResourceBackend for FileBackend {
    async fn load(&self, id: &ResourceId) -> Result<Option<Resource>, BackendError> {
        let path = self.path_for(id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(BackendError::io(&path, source)),
        };
        let resource: Resource = serde_json::from_slice(&bytes).map_err(|e| BackendError::Corrupt {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if resource.id() != id {
            return Err(BackendError::Corrupt {
                path,
                reason: format!("file holds resource {}", resource.id()),
            });
        }
        Ok(Some(resource))
    }

    async fn save(&self, resource: &Resource) -> Result<(), BackendError> {
        let bytes = serde_json::to_vec(resource)?;
        let dir = self.dir.clone();
        let path = self.path_for(resource.id());
        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &bytes))
            .await
            .map_err(|e| BackendError::Unavailable(format!("write task failed: {e}")))?
    }

    async fn ids(&self) -> Result<Vec<ResourceId>, BackendError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|source| BackendError::io(&self.dir, source))?;
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| BackendError::io(&self.dir, source))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            match ResourceId::new(stem) {
                Ok(id) => ids.push(id),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping file with invalid resource id"),
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

fn write_atomic(dir: &Path, path: &Path, bytes: &[u8]) -> Result<(), BackendError> {
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|source| BackendError::io(dir, source))?;
    file.write_all(bytes)
        .and_then(|()| file.as_file().sync_all())
        .map_err(|source| BackendError::io(file.path(), source))?;
    file.persist(path)
        .map_err(|e| BackendError::io(path, e.error))?;
    Ok(())
}

/// Storage failure
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Filesystem error
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Resource could not be serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored data does not parse as a resource
    #[error("corrupt resource file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Backend cannot serve requests
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl BackendError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resource(id: &str) -> Resource {
        Resource::new(ResourceId::new(id).unwrap()).with_field("companyName", json!(id))
    }

    #[tokio::test]
    async fn memory_roundtrip() {
        let backend = MemoryBackend::new();
        assert!(backend.is_empty());
        backend.save(&resource("b")).await.unwrap();
        backend.save(&resource("a")).await.unwrap();
        let ids = backend.ids().await.unwrap();
        assert_eq!(ids.iter().map(ResourceId::as_str).collect::<Vec<_>>(), vec!["a", "b"]);
        let loaded = backend.load(&ResourceId::new("a").unwrap()).await.unwrap();
        assert_eq!(loaded, Some(resource("a")));
        assert_eq!(backend.len(), 2);
    }

    #[tokio::test]
    async fn file_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        let loaded = backend.load(&ResourceId::new("1").unwrap()).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn file_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        backend.save(&resource("1")).await.unwrap();
        let updated = resource("1").with_field("heroText", json!("new"));
        backend.save(&updated).await.unwrap();
        let loaded = backend.load(updated.id()).await.unwrap().unwrap();
        assert_eq!(loaded, updated);
        assert!(backend.path_for(updated.id()).exists());
    }

    #[tokio::test]
    async fn file_ids_skip_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        backend.save(&resource("2")).await.unwrap();
        backend.save(&resource("1")).await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        std::fs::write(dir.path().join(".hidden.json"), b"{}").unwrap();
        let ids = backend.ids().await.unwrap();
        assert_eq!(ids.iter().map(ResourceId::as_str).collect::<Vec<_>>(), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn file_corrupt_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).await.unwrap();
        std::fs::write(dir.path().join("1.json"), b"{not json").unwrap();
        let err = backend.load(&ResourceId::new("1").unwrap()).await.unwrap_err();
        assert!(matches!(err, BackendError::Corrupt { .. }));
    }
}
