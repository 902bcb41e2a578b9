//! Persistent asset store
//!
//! One [`AssetStore`] per namespace maps [`AssetToken`] to [`StoredAsset`].
//! The in-memory map is authoritative for the session; the backend copy is
//! best-effort and bounded by the eviction sweep:
//! - entries older than `max_age` are dropped
//! - when the serialized namespace exceeds `soft_cap_bytes`, oldest entries
//!   go first until it fits
//!
//! Writes and sweeps are serialized through one async lock so two queues
//! sharing a store never observe a half-finished sweep.

use crate::asset::{AssetToken, MediaKind, PayloadDigest, StoredAsset};
use crate::backend::StorageBackend;
use crate::clock::SharedClock;
use crate::error::{PersistenceError, PersistenceResult};
use chrono::Duration;
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Per-namespace store limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Entries older than this are evicted
    pub max_age: Duration,
    /// Serialized namespace size that triggers oldest-first eviction
    pub soft_cap_bytes: usize,
}

impl StoreConfig {
    /// Default soft cap (4 MiB per namespace)
    pub const DEFAULT_SOFT_CAP: usize = 4 * 1024 * 1024;

    /// Defaults for an asset class: images live 1h, videos 24h
    #[must_use]
    pub fn for_kind(kind: MediaKind) -> Self {
        let max_age = match kind {
            MediaKind::Image => Duration::hours(1),
            MediaKind::Video => Duration::hours(24),
        };
        Self {
            max_age,
            soft_cap_bytes: Self::DEFAULT_SOFT_CAP,
        }
    }

    /// With max age
    #[inline]
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// With soft cap
    #[inline]
    #[must_use]
    pub fn with_soft_cap(mut self, bytes: usize) -> Self {
        self.soft_cap_bytes = bytes;
        self
    }
}

/// Outcome of an eviction sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Entries dropped for age
    pub expired: usize,
    /// Entries dropped to get under the size cap
    pub evicted: usize,
}

impl SweepReport {
    /// Total entries removed
    #[inline]
    #[must_use]
    pub fn removed(&self) -> usize {
        self.expired + self.evicted
    }
}

type AssetMap = IndexMap<AssetToken, StoredAsset>;

/// Namespace-scoped asset store
#[derive(Debug)]
pub struct AssetStore {
    kind: MediaKind,
    config: StoreConfig,
    backend: Arc<dyn StorageBackend>,
    clock: SharedClock,
    entries: RwLock<AssetMap>,
    by_digest: DashMap<PayloadDigest, AssetToken>,
    write_lock: Mutex<()>,
}

impl AssetStore {
    /// Open the namespace for `kind`, loading whatever the backend holds
    ///
    /// Expired entries are dropped on load. A namespace blob that does not
    /// parse is discarded with a warning rather than failing the open.
    ///
    /// # Errors
    /// Returns backend I/O errors
    pub async fn open(
        backend: Arc<dyn StorageBackend>,
        kind: MediaKind,
        config: StoreConfig,
        clock: SharedClock,
    ) -> PersistenceResult<Self> {
        let namespace = kind.namespace();
        let entries = match backend.load(namespace).await? {
            Some(bytes) => decode_namespace(kind, &bytes).unwrap_or_else(|e| {
                tracing::warn!(namespace, error = %e, "discarding unreadable asset namespace");
                AssetMap::new()
            }),
            None => AssetMap::new(),
        };

        let store = Self {
            kind,
            config,
            backend,
            clock,
            entries: RwLock::new(entries),
            by_digest: DashMap::new(),
            write_lock: Mutex::new(()),
        };
        store.rebuild_digest_index();
        let expired = store.drop_expired();
        tracing::debug!(
            namespace,
            loaded = store.len(),
            expired,
            "opened asset store"
        );
        Ok(store)
    }

    /// Asset class of this namespace
    #[inline]
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Active limits
    #[inline]
    #[must_use]
    pub fn config(&self) -> StoreConfig {
        self.config
    }

    /// Look up a live asset
    ///
    /// Entries past `max_age` read as absent even before the next sweep
    /// removes them.
    #[must_use]
    pub fn get(&self, token: &AssetToken) -> Option<StoredAsset> {
        let entries = self.entries.read();
        entries
            .get(token)
            .filter(|asset| !self.is_expired(asset))
            .cloned()
    }

    /// Check for a live asset
    #[inline]
    #[must_use]
    pub fn contains(&self, token: &AssetToken) -> bool {
        self.get(token).is_some()
    }

    /// Find a live asset holding exactly `payload`
    #[must_use]
    pub fn find_by_payload(&self, payload: &str) -> Option<AssetToken> {
        let digest = PayloadDigest::of(payload);
        let token = self.by_digest.get(&digest)?.value().clone();
        let entries = self.entries.read();
        entries
            .get(&token)
            .filter(|asset| asset.inline_payload == payload && !self.is_expired(asset))
            .map(|asset| asset.token.clone())
    }

    /// Insert an asset and persist the namespace
    ///
    /// Runs an eviction sweep first. On `PersistenceError::Full` the oldest
    /// entries are evicted to fit the reported quota and the write is
    /// retried once. The eviction only applies to the session if that retry
    /// succeeds. Otherwise the error is returned, every entry stays readable
    /// for the rest of the session, and the backend keeps its previous copy.
    ///
    /// # Errors
    /// Returns the persistence failure of the final write attempt
    pub async fn put(&self, asset: StoredAsset) -> PersistenceResult<()> {
        let _guard = self.write_lock.lock().await;
        let token = asset.token.clone();

        self.insert_in_memory(asset);
        let report = self.sweep_in_memory(Some(&token));
        if report.removed() > 0 {
            tracing::debug!(
                namespace = self.kind.namespace(),
                expired = report.expired,
                evicted = report.evicted,
                "sweep before write"
            );
        }

        match self.persist().await {
            Err(PersistenceError::Full { needed, quota }) => {
                tracing::warn!(
                    namespace = self.kind.namespace(),
                    needed,
                    quota,
                    "asset namespace full, evicting and retrying once"
                );
                self.persist_with_eviction(quota, &token).await
            }
            other => other,
        }
    }

    /// Save the namespace minus the oldest entries that keep it over
    /// `quota`, dropping them from memory only once the save lands
    async fn persist_with_eviction(
        &self,
        quota: usize,
        protect: &AssetToken,
    ) -> PersistenceResult<()> {
        let (victims, bytes) = {
            let entries = self.entries.read();
            let victims = plan_eviction(&entries, quota, Some(protect));
            let mut candidate = entries.clone();
            for token in &victims {
                candidate.shift_remove(token);
            }
            (victims, serde_json::to_vec(&candidate)?)
        };

        self.backend.save(self.kind.namespace(), &bytes).await?;
        for token in &victims {
            self.remove_in_memory(token);
        }
        tracing::debug!(evicted = victims.len(), "evicted for quota");
        Ok(())
    }

    /// Remove an asset, returns it if present
    ///
    /// # Errors
    /// Returns the persistence failure; the in-memory removal still applies
    pub async fn remove(&self, token: &AssetToken) -> PersistenceResult<Option<StoredAsset>> {
        let _guard = self.write_lock.lock().await;
        let removed = self.remove_in_memory(token);
        if removed.is_some() {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Run an eviction sweep and persist the result
    ///
    /// # Errors
    /// Returns the persistence failure; the in-memory sweep still applies
    pub async fn sweep(&self) -> PersistenceResult<SweepReport> {
        let _guard = self.write_lock.lock().await;
        let report = self.sweep_in_memory(None);
        if report.removed() > 0 {
            tracing::info!(
                namespace = self.kind.namespace(),
                expired = report.expired,
                evicted = report.evicted,
                "asset store sweep"
            );
            self.persist().await?;
        }
        Ok(report)
    }

    /// Drop every entry and the persisted namespace
    ///
    /// # Errors
    /// Returns backend failures
    pub async fn clear(&self) -> PersistenceResult<()> {
        let _guard = self.write_lock.lock().await;
        self.entries.write().clear();
        self.by_digest.clear();
        self.backend.remove(self.kind.namespace()).await
    }

    /// Number of entries held (including not-yet-swept expired ones)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Tokens currently held, oldest insertion first
    #[must_use]
    pub fn tokens(&self) -> Vec<AssetToken> {
        self.entries.read().keys().cloned().collect()
    }

    /// Size of the namespace as it would be persisted
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        serde_json::to_vec(&*self.entries.read()).map_or(0, |bytes| bytes.len())
    }

    fn is_expired(&self, asset: &StoredAsset) -> bool {
        self.clock.now() - asset.timestamp > self.config.max_age
    }

    fn insert_in_memory(&self, asset: StoredAsset) {
        let digest = asset.digest();
        let token = asset.token.clone();
        let previous = self.entries.write().insert(token.clone(), asset);
        if let Some(previous) = previous {
            self.forget_digest(&previous);
        }
        self.by_digest.insert(digest, token);
    }

    fn remove_in_memory(&self, token: &AssetToken) -> Option<StoredAsset> {
        let removed = self.entries.write().shift_remove(token);
        if let Some(asset) = &removed {
            self.forget_digest(asset);
        }
        removed
    }

    fn forget_digest(&self, asset: &StoredAsset) {
        self.by_digest
            .remove_if(&asset.digest(), |_, token| *token == asset.token);
    }

    fn rebuild_digest_index(&self) {
        self.by_digest.clear();
        for (token, asset) in self.entries.read().iter() {
            self.by_digest.insert(asset.digest(), token.clone());
        }
    }

    fn drop_expired(&self) -> usize {
        let expired: Vec<AssetToken> = self
            .entries
            .read()
            .values()
            .filter(|asset| self.is_expired(asset))
            .map(|asset| asset.token.clone())
            .collect();
        for token in &expired {
            self.remove_in_memory(token);
        }
        expired.len()
    }

    fn sweep_in_memory(&self, protect: Option<&AssetToken>) -> SweepReport {
        let expired = self.drop_expired();
        let evicted = self.evict_to_fit(self.config.soft_cap_bytes, protect);
        SweepReport { expired, evicted }
    }

    /// Evict oldest entries until the serialized map fits `limit`
    fn evict_to_fit(&self, limit: usize, protect: Option<&AssetToken>) -> usize {
        let victims = plan_eviction(&self.entries.read(), limit, protect);
        victims
            .iter()
            .filter(|token| self.remove_in_memory(token).is_some())
            .count()
    }

    async fn persist(&self) -> PersistenceResult<()> {
        let bytes = serde_json::to_vec(&*self.entries.read())?;
        self.backend.save(self.kind.namespace(), &bytes).await
    }
}

/// Parse a persisted namespace, rejecting entries filed under the wrong key
/// or the wrong asset class
fn decode_namespace(kind: MediaKind, bytes: &[u8]) -> PersistenceResult<AssetMap> {
    let corrupt = |reason: String| PersistenceError::Corrupt {
        namespace: kind.namespace().to_string(),
        reason,
    };
    let map: AssetMap = serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
    if let Some((key, asset)) = map
        .iter()
        .find(|(key, asset)| **key != asset.token || key.kind() != kind)
    {
        return Err(corrupt(format!("entry {key} holds {}", asset.token)));
    }
    Ok(map)
}

/// Oldest-first tokens to drop so `entries` serializes within `limit`
fn plan_eviction(
    entries: &AssetMap,
    limit: usize,
    protect: Option<&AssetToken>,
) -> Vec<AssetToken> {
    let mut size = serde_json::to_vec(entries).map_or(0, |bytes| bytes.len());
    if size <= limit {
        return Vec::new();
    }

    let mut by_age: Vec<&StoredAsset> = entries
        .values()
        .filter(|asset| Some(&asset.token) != protect)
        .collect();
    by_age.sort_by_key(|asset| asset.timestamp);

    let mut victims = Vec::new();
    for asset in by_age {
        if size <= limit {
            break;
        }
        size = size.saturating_sub(entry_size(asset));
        victims.push(asset.token.clone());
    }
    victims
}

/// Approximate bytes one entry contributes to the namespace JSON
fn entry_size(asset: &StoredAsset) -> usize {
    let value = serde_json::to_vec(asset).map_or(0, |bytes| bytes.len());
    // key quotes, colon, separator
    value + asset.token.as_str().len() + 4
}
