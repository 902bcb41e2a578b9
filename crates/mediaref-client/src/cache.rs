//! Query response cache using moka
//!
//! Entries carry their own `expires_at`, checked against the injected clock
//! on every read; moka's own TTL only bounds memory for entries nobody reads
//! again.

use chrono::{DateTime, Duration, Utc};
use mediaref_store::SharedClock;
use moka::future::Cache;
use std::fmt::Debug;
use std::sync::Arc;

/// Cached value with its lifetime
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    /// Cached value
    pub data: T,
    /// Insertion time
    pub timestamp: DateTime<Utc>,
    /// Entry is stale once `now > expires_at`
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Check staleness at `now`
    #[inline]
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Response cache keyed by normalized query
#[derive(Debug, Clone)]
pub struct ResponseCache<T: Clone + Send + Sync + 'static> {
    inner: Cache<String, Arc<CacheEntry<T>>>,
    ttl: Duration,
    clock: SharedClock,
}

impl<T: Clone + Send + Sync + Debug + 'static> ResponseCache<T> {
    /// Create cache holding at most `max_capacity` responses for `ttl`
    #[must_use]
    pub fn new(max_capacity: u64, ttl: Duration, clock: SharedClock) -> Self {
        let backstop = ttl
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(1))
            .max(std::time::Duration::from_secs(1));
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(backstop)
                .build(),
            ttl,
            clock,
        }
    }

    /// Live value for `key`; a stale entry is invalidated and reads as a miss
    pub async fn get(&self, key: &str) -> Option<T> {
        let entry = self.inner.get(key).await?;
        if entry.is_expired(self.clock.now()) {
            self.inner.invalidate(key).await;
            return None;
        }
        Some(entry.data.clone())
    }

    /// Full entry for `key`, including stale ones
    pub async fn entry(&self, key: &str) -> Option<CacheEntry<T>> {
        self.inner.get(key).await.map(|arc| (*arc).clone())
    }

    /// Store `data` under `key` with the cache-wide TTL
    pub async fn insert(&self, key: String, data: T) {
        let timestamp = self.clock.now();
        let entry = CacheEntry {
            data,
            timestamp,
            expires_at: timestamp + self.ttl,
        };
        self.inner.insert(key, Arc::new(entry)).await;
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.inner.invalidate_all();
        self.inner.run_pending_tasks().await;
    }

    /// Number of entries after pending maintenance
    pub async fn len(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }

    /// Check if empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Configured TTL
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaref_store::ManualClock;

    fn cache() -> (ResponseCache<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (
            ResponseCache::new(100, Duration::hours(24), clock.clone()),
            clock,
        )
    }

    #[tokio::test]
    async fn hit_within_ttl() {
        let (cache, clock) = cache();
        cache.insert("k".into(), "v".into()).await;

        clock.advance(Duration::hours(23));
        assert_eq!(cache.get("k").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn lazily_expires() {
        let (cache, clock) = cache();
        cache.insert("k".into(), "v".into()).await;

        let entry = cache.entry("k").await.unwrap();
        assert_eq!(entry.expires_at, entry.timestamp + Duration::hours(24));

        clock.advance(Duration::hours(24) + Duration::seconds(1));
        assert_eq!(cache.get("k").await, None);
        assert!(cache.entry("k").await.is_none());
    }

    #[tokio::test]
    async fn clear_empties() {
        let (cache, _clock) = cache();
        cache.insert("a".into(), "1".into()).await;
        cache.insert("b".into(), "2".into()).await;
        assert_eq!(cache.len().await, 2);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[test]
    fn entry_expiry_boundary() {
        let now = Utc::now();
        let entry = CacheEntry {
            data: 1,
            timestamp: now,
            expires_at: now,
        };
        assert!(!entry.is_expired(now));
        assert!(entry.is_expired(now + Duration::milliseconds(1)));
    }
}
