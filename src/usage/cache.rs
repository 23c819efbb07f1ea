use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::warehouse::{FetchError, QueryExecutor};

use super::fetcher::fetch_usage;
use super::types::UsageRecord;

/// How long a fetched table is served before the next call re-queries
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

struct CacheSlot {
    table: Arc<Vec<UsageRecord>>,
    stored_at: Instant,
}

/// Single-slot-per-key TTL memoization of the fetched usage table, keyed by
/// session identity. One entry per active session; no eviction policy beyond
/// expiry.
pub struct UsageCache {
    ttl: Duration,
    slots: Mutex<HashMap<String, CacheSlot>>,
}

impl UsageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the cached table for `key` if it was stored less than one TTL
    /// before `now`. Pure time comparison; never touches the warehouse.
    pub fn lookup(&self, key: &str, now: Instant) -> Option<Arc<Vec<UsageRecord>>> {
        let slots = self.slots.lock().unwrap();
        match slots.get(key) {
            Some(slot) if now.duration_since(slot.stored_at) < self.ttl => {
                Some(Arc::clone(&slot.table))
            }
            _ => None,
        }
    }

    /// Replace the slot for `key` with a freshly fetched table
    pub fn store(&self, key: &str, table: Vec<UsageRecord>, now: Instant) -> Arc<Vec<UsageRecord>> {
        let table = Arc::new(table);
        let mut slots = self.slots.lock().unwrap();
        slots.insert(
            key.to_string(),
            CacheSlot {
                table: Arc::clone(&table),
                stored_at: now,
            },
        );
        table
    }

    /// Serve from cache or run the fixed query once and remember the result.
    /// The lock is not held across the network call; two sessions racing on
    /// a cold slot at worst duplicate one query, last writer wins.
    pub async fn fetch_cached(
        &self,
        key: &str,
        executor: &dyn QueryExecutor,
    ) -> Result<Arc<Vec<UsageRecord>>, FetchError> {
        if let Some(table) = self.lookup(key, Instant::now()) {
            return Ok(table);
        }
        let table = fetch_usage(executor).await?;
        Ok(self.store(key, table, Instant::now()))
    }
}

impl Default for UsageCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usage::testing::{wire_result, CountingExecutor};

    #[test]
    fn test_lookup_within_and_past_ttl() {
        let cache = UsageCache::new(Duration::from_secs(300));
        let t0 = Instant::now();
        cache.store("acct/alice", Vec::new(), t0);

        assert!(cache.lookup("acct/alice", t0).is_some());
        assert!(cache
            .lookup("acct/alice", t0 + Duration::from_secs(299))
            .is_some());
        assert!(cache
            .lookup("acct/alice", t0 + Duration::from_secs(300))
            .is_none());
    }

    #[test]
    fn test_lookup_unknown_key() {
        let cache = UsageCache::default();
        assert!(cache.lookup("nobody", Instant::now()).is_none());
    }

    #[test]
    fn test_store_replaces_slot() {
        let cache = UsageCache::new(Duration::from_secs(300));
        let t0 = Instant::now();
        let first = cache.store("k", Vec::new(), t0);
        let second = cache.store("k", Vec::new(), t0 + Duration::from_secs(1));
        assert!(!Arc::ptr_eq(&first, &second));
        let served = cache.lookup("k", t0 + Duration::from_secs(2)).unwrap();
        assert!(Arc::ptr_eq(&served, &second));
    }

    #[tokio::test]
    async fn test_repeated_fetch_within_ttl_hits_cache() {
        let cache = UsageCache::new(Duration::from_secs(300));
        let executor = CountingExecutor::new(wire_result(&[(
            "Q1",
            "alice",
            "gpt-4",
            "COMPLETE_FUNC",
            100,
            0.001,
        )]));

        let first = cache.fetch_cached("acct/alice", &executor).await.unwrap();
        let second = cache.fetch_cached("acct/alice", &executor).await.unwrap();

        assert_eq!(executor.calls(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 1);
        assert_eq!(*first, *second);
    }

    #[tokio::test]
    async fn test_expired_slot_refetches_and_replaces() {
        let cache = UsageCache::new(Duration::from_millis(50));
        let executor = CountingExecutor::new(wire_result(&[(
            "Q1",
            "alice",
            "gpt-4",
            "COMPLETE_FUNC",
            100,
            0.001,
        )]));

        let first = cache.fetch_cached("acct/alice", &executor).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        let second = cache.fetch_cached("acct/alice", &executor).await.unwrap();

        assert_eq!(executor.calls(), 2);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_sessions_get_independent_slots() {
        let cache = UsageCache::new(Duration::from_secs(300));
        let executor = CountingExecutor::new(wire_result(&[]));

        cache.fetch_cached("acct/alice", &executor).await.unwrap();
        cache.fetch_cached("acct/bob", &executor).await.unwrap();

        assert_eq!(executor.calls(), 2);
    }

    #[tokio::test]
    async fn test_fetch_error_leaves_cache_cold() {
        let cache = UsageCache::new(Duration::from_secs(300));
        let failing = CountingExecutor::failing();

        assert!(cache.fetch_cached("acct/alice", &failing).await.is_err());
        assert!(cache.lookup("acct/alice", Instant::now()).is_none());
    }
}
