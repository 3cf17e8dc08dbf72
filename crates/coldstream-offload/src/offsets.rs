//! Entry Offset Cache
//!
//! Process-wide memoization of exact entry byte offsets in offloaded data
//! blobs, shared by reference across every read handle.
//!
//! ## Why Caching?
//!
//! The index block only maps an entry ID to the start of the block that
//! contains it. A cold read therefore seeks to the block start and scans
//! forward, skipping earlier records. While scanning, the parser learns the
//! exact header offset of every entry it touches; remembering those lets a
//! later read of the same entry seek straight to it.
//!
//! This is an optimization only, never a correctness dependency: a miss just
//! means "scan from the nearest known position", and a stale value is healed
//! by the parse loop's resync paths.
//!
//! ## Bounds
//!
//! Capacity is count-based LRU across all ledgers. Both `put` and `get` are
//! O(1) against in-memory state; the cache never touches I/O.

use lru::LruCache;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

/// Bounded `(ledger_id, entry_id) -> byte offset` map
pub struct OffsetCache {
    inner: Mutex<LruCache<(u64, i64), u64>>,
}

impl OffsetCache {
    /// Create a cache holding at most `capacity` entry offsets.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Remember the exact offset of an entry's record header.
    ///
    /// Idempotent; a later put may overwrite with a different offset if the
    /// entry is re-observed. Callers never rely on a cached value being
    /// immutable.
    pub async fn put(&self, ledger_id: u64, entry_id: i64, offset: u64) {
        let mut inner = self.inner.lock().await;
        inner.put((ledger_id, entry_id), offset);
    }

    /// Exact offset of an entry, if still cached. Updates LRU order.
    pub async fn get(&self, ledger_id: u64, entry_id: i64) -> Option<u64> {
        let mut inner = self.inner.lock().await;
        inner.get(&(ledger_id, entry_id)).copied()
    }

    /// Number of cached offsets.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn miss_returns_none() {
        let cache = OffsetCache::new(16);
        assert_eq!(cache.get(1, 0).await, None);
    }

    #[tokio::test]
    async fn put_then_get() {
        let cache = OffsetCache::new(16);
        cache.put(1, 7, 4096).await;
        assert_eq!(cache.get(1, 7).await, Some(4096));
        // Same entry ID under another ledger is a distinct key
        assert_eq!(cache.get(2, 7).await, None);
    }

    #[tokio::test]
    async fn later_put_overwrites() {
        let cache = OffsetCache::new(16);
        cache.put(1, 7, 4096).await;
        cache.put(1, 7, 8192).await;
        assert_eq!(cache.get(1, 7).await, Some(8192));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn evicts_least_recently_used() {
        let cache = OffsetCache::new(2);
        cache.put(1, 0, 0).await;
        cache.put(1, 1, 100).await;

        // Touch entry 0 so entry 1 becomes the eviction candidate
        cache.get(1, 0).await;
        cache.put(1, 2, 200).await;

        assert_eq!(cache.get(1, 0).await, Some(0));
        assert_eq!(cache.get(1, 1).await, None);
        assert_eq!(cache.get(1, 2).await, Some(200));
    }

    #[tokio::test]
    async fn zero_capacity_is_clamped() {
        let cache = OffsetCache::new(0);
        cache.put(9, 0, 64).await;
        assert_eq!(cache.get(9, 0).await, Some(64));
    }
}
