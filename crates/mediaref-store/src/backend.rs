//! Storage backends
//!
//! A backend persists one opaque blob per namespace. The store serializes
//! its whole namespace map as JSON and hands the bytes over; backends never
//! interpret them.

use crate::error::{PersistenceError, PersistenceResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

/// Namespace blob persistence
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    /// Load a namespace blob, `None` if never written
    async fn load(&self, namespace: &str) -> PersistenceResult<Option<Vec<u8>>>;

    /// Replace a namespace blob
    ///
    /// # Errors
    /// - `PersistenceError::Full` when the blob exceeds the backend quota
    /// - `PersistenceError::Io` on backend failure
    async fn save(&self, namespace: &str, bytes: &[u8]) -> PersistenceResult<()>;

    /// Delete a namespace blob
    async fn remove(&self, namespace: &str) -> PersistenceResult<()>;
}

/// Check a write against an optional per-namespace quota
fn check_quota(quota: Option<usize>, needed: usize) -> PersistenceResult<()> {
    match quota {
        Some(quota) if needed > quota => Err(PersistenceError::Full { needed, quota }),
        _ => Ok(()),
    }
}

/// In-memory backend
///
/// Survives store re-opens within one process; an optional quota mimics a
/// size-limited profile store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
    quota: Option<usize>,
}

impl MemoryBackend {
    /// Create unbounded backend
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create backend that rejects blobs larger than `quota` bytes
    #[inline]
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    /// Size of a stored namespace blob
    #[must_use]
    pub fn blob_len(&self, namespace: &str) -> Option<usize> {
        self.blobs.read().get(namespace).map(Vec::len)
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn load(&self, namespace: &str) -> PersistenceResult<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(namespace).cloned())
    }

    async fn save(&self, namespace: &str, bytes: &[u8]) -> PersistenceResult<()> {
        check_quota(self.quota, bytes.len())?;
        self.blobs
            .write()
            .insert(namespace.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn remove(&self, namespace: &str) -> PersistenceResult<()> {
        self.blobs.write().remove(namespace);
        Ok(())
    }
}

/// Directory backend: one `<namespace>.json` per namespace
///
/// Writes go to a sibling temp file and are renamed into place so a crash
/// never leaves a half-written namespace behind.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
    quota: Option<usize>,
}

impl FileBackend {
    /// Create backend rooted at `dir` (created on first write)
    #[inline]
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            quota: None,
        }
    }

    /// With per-namespace byte quota
    #[inline]
    #[must_use]
    pub fn with_quota(mut self, quota: usize) -> Self {
        self.quota = Some(quota);
        self
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, namespace: &str) -> PathBuf {
        self.dir.join(format!("{namespace}.json"))
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    async fn load(&self, namespace: &str) -> PersistenceResult<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(namespace)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, namespace: &str, bytes: &[u8]) -> PersistenceResult<()> {
        check_quota(self.quota, bytes.len())?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let target = self.path_for(namespace);
        let staging = self.dir.join(format!(".{namespace}.json.tmp"));
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &target).await?;
        Ok(())
    }

    async fn remove(&self, namespace: &str) -> PersistenceResult<()> {
        match tokio::fs::remove_file(self.path_for(namespace)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
