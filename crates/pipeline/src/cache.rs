//! Bounded TTL cache for validated provider results.
//!
//! Entries carry their own TTL and are evicted lazily: an expired entry is
//! never returned by [`ResponseCache::get`]. Total size is capped, least
//! valuable entries are dropped first once the cap is reached.

use std::time::{Duration, Instant};

use moka::sync::Cache;
use moka::Expiry;
use serde_json::Value;

/// Default number of cached results.
pub const DEFAULT_MAX_ENTRIES: u64 = 10_000;

#[derive(Clone)]
struct Entry {
    value: Value,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// Memo of generation results keyed by `genflow_core::payload::cache_key`.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Cache<String, Entry>,
}

impl ResponseCache {
    pub fn new(max_entries: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();
        Self { inner }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.get(key).map(|entry| entry.value)
    }

    /// Store `value` for `ttl`, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        self.inner.insert(key.into(), Entry { value, ttl });
    }

    pub fn del(&self, key: &str) {
        self.inner.invalidate(key);
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Approximate number of live entries.
    pub fn len(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn get_after_set_returns_value() {
        let cache = ResponseCache::default();
        cache.set("k", json!({"text": "v"}), Duration::from_millis(1000));
        assert_eq!(cache.get("k"), Some(json!({"text": "v"})));
    }

    #[test]
    fn entry_expires_after_ttl() {
        let cache = ResponseCache::default();
        cache.set("k", json!(1), Duration::from_millis(1000));
        assert!(cache.get("k").is_some());

        std::thread::sleep(Duration::from_millis(1100));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn set_replaces_value_and_ttl() {
        let cache = ResponseCache::default();
        cache.set("k", json!(1), Duration::from_millis(50));
        cache.set("k", json!(2), Duration::from_secs(60));
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(cache.get("k"), Some(json!(2)));
    }

    #[test]
    fn del_and_clear_remove_entries() {
        let cache = ResponseCache::default();
        cache.set("a", json!(1), Duration::from_secs(60));
        cache.set("b", json!(2), Duration::from_secs(60));

        cache.del("a");
        assert_eq!(cache.get("a"), None);
        assert!(cache.get("b").is_some());

        cache.clear();
        assert_eq!(cache.get("b"), None);
    }

    #[test]
    fn capacity_is_bounded() {
        let cache = ResponseCache::new(10);
        for i in 0..200 {
            cache.set(format!("k{i}"), json!(i), Duration::from_secs(60));
        }
        assert!(cache.len() <= 10);
    }
}
