use bytes::Bytes;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Bounded map of cache keys to compressed result frames.
///
/// Recency is a logical clock bumped on every insert and hit, so eviction order is exact
/// even when two touches land in the same instant. A separate generation counter moves on
/// every invalidation so that results fetched before it can be refused. All state lives
/// behind one lock.
pub struct CacheStore {
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    data: HashMap<String, CacheEntry>,
    capacity: usize,
    clock: u64,
    generation: u64,
    stats: CacheStats,
}

/// Cache entry
#[derive(Clone)]
struct CacheEntry {
    payload: Bytes,
    /// Logical timestamp of the last insert or hit
    last_access: u64,
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub invalidations: u64,
    pub entries: usize,
    pub total_bytes: usize,
}

impl CacheStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

impl StoreInner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.data.remove(key)?;
        self.stats.total_bytes = self.stats.total_bytes.saturating_sub(entry.payload.len());
        self.stats.entries = self.data.len();
        Some(entry)
    }

    fn insert(&mut self, key: String, payload: Bytes) {
        if self.capacity == 0 {
            return;
        }

        if self.remove(&key).is_none() && self.data.len() >= self.capacity {
            self.evict_oldest(1);
        }

        let last_access = self.tick();
        let size = payload.len();
        debug!("Cache PUT: {} ({} bytes)", key, size);
        self.data.insert(
            key,
            CacheEntry {
                payload,
                last_access,
            },
        );

        self.stats.entries = self.data.len();
        self.stats.total_bytes += size;
    }

    fn evict_oldest(&mut self, count: usize) -> usize {
        if count == 0 || self.data.is_empty() {
            return 0;
        }

        let mut by_age: Vec<(u64, String)> = self
            .data
            .iter()
            .map(|(key, entry)| (entry.last_access, key.clone()))
            .collect();
        by_age.sort_unstable_by_key(|(last_access, _)| *last_access);

        let mut evicted = 0;
        for (_, key) in by_age.into_iter().take(count) {
            if self.remove(&key).is_some() {
                debug!("Cache EVICT: {}", key);
                evicted += 1;
            }
        }
        self.stats.evictions += evicted as u64;
        evicted
    }
}

impl CacheStore {
    /// Create a store holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                data: HashMap::new(),
                capacity,
                clock: 0,
                generation: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    /// Get a payload, refreshing its recency
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let now = inner.tick();

        match inner.data.get_mut(key) {
            Some(entry) => {
                entry.last_access = now;
                let payload = entry.payload.clone();
                inner.stats.hits += 1;
                debug!("Cache HIT for key: {}", key);
                Some(payload)
            }
            None => {
                inner.stats.misses += 1;
                debug!("Cache MISS for key: {}", key);
                None
            }
        }
    }

    /// Insert a payload. A new key arriving at capacity evicts the single oldest entry first.
    pub fn put(&self, key: String, payload: Bytes) {
        self.inner.lock().insert(key, payload);
    }

    /// Current invalidation generation. Capture it before fetching a result and hand it to
    /// [`CacheStore::put_if_current`].
    pub fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Insert only if no invalidation or clear happened since `generation` was read.
    /// Returns whether the payload was stored.
    pub fn put_if_current(&self, key: String, payload: Bytes, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            debug!("Cache PUT skipped, invalidated while fetching: {}", key);
            return false;
        }
        inner.insert(key, payload);
        true
    }

    /// Remove a single key
    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().remove(key).is_some()
    }

    /// Remove every entry whose key satisfies `predicate`; returns how many were removed
    pub fn invalidate_matching<F>(&self, predicate: F) -> usize
    where
        F: Fn(&str) -> bool,
    {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        let doomed: Vec<String> = inner
            .data
            .keys()
            .filter(|key| predicate(key))
            .cloned()
            .collect();

        for key in &doomed {
            inner.remove(key);
        }
        inner.stats.invalidations += doomed.len() as u64;
        doomed.len()
    }

    /// Drop every entry
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.data.len();
        inner.generation += 1;
        inner.data.clear();
        inner.stats.entries = 0;
        inner.stats.total_bytes = 0;
        debug!("Cache CLEAR ({} entries)", count);
        count
    }

    /// Evict the `count` least recently used entries
    pub fn evict_oldest(&self, count: usize) -> usize {
        self.inner.lock().evict_oldest(count)
    }

    /// Trim the store back under capacity when it has grown past it.
    ///
    /// Removes the oldest quarter of the entries, or more if that is not enough to get
    /// back to capacity. Returns the number of evicted entries.
    pub fn trim_overflow(&self) -> usize {
        let mut inner = self.inner.lock();
        let len = inner.data.len();
        if len <= inner.capacity {
            return 0;
        }
        let count = (len / 4).max(len - inner.capacity);
        inner.evict_oldest(count)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.lock().data.contains_key(key)
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }

    /// Insert without any capacity check, to simulate overshoot
    #[cfg(test)]
    pub(crate) fn force_insert(&self, key: &str) {
        let mut inner = self.inner.lock();
        let last_access = inner.tick();
        inner.data.insert(
            key.to_string(),
            CacheEntry {
                payload: Bytes::from_static(b"x"),
                last_access,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(v: &'static [u8]) -> Bytes {
        Bytes::from_static(v)
    }

    #[test]
    fn test_cache_put_get() {
        let cache = CacheStore::new(100);

        cache.put("key1".to_string(), payload(&[1, 2, 3]));

        let value = cache.get("key1").unwrap();
        assert_eq!(&value[..], &[1, 2, 3]);

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.total_bytes, 3);
    }

    #[test]
    fn test_cache_miss() {
        let cache = CacheStore::new(100);

        assert!(cache.get("nonexistent").is_none());

        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_put_at_capacity_evicts_oldest() {
        let cache = CacheStore::new(2);

        cache.put("A".to_string(), payload(b"a"));
        cache.put("B".to_string(), payload(b"b"));
        cache.put("C".to_string(), payload(b"c"));

        assert_eq!(cache.len(), 2);
        assert!(!cache.contains_key("A"), "A should be evicted");
        assert!(cache.contains_key("B"));
        assert!(cache.contains_key("C"));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_hit_refreshes_recency() {
        let cache = CacheStore::new(3);

        cache.put("key1".to_string(), payload(b"1"));
        cache.put("key2".to_string(), payload(b"2"));
        cache.put("key3".to_string(), payload(b"3"));

        cache.get("key1");
        cache.put("key4".to_string(), payload(b"4"));

        assert!(cache.contains_key("key1"), "key1 was accessed, should survive");
        assert!(!cache.contains_key("key2"), "key2 is now the oldest");
    }

    #[test]
    fn test_overwrite_does_not_evict() {
        let cache = CacheStore::new(2);

        cache.put("A".to_string(), payload(b"a"));
        cache.put("B".to_string(), payload(b"b"));
        cache.put("A".to_string(), payload(b"aa"));

        assert_eq!(cache.len(), 2);
        assert_eq!(&cache.get("A").unwrap()[..], b"aa");
        assert!(cache.contains_key("B"));
        assert_eq!(cache.stats().total_bytes, 3);
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let cache = CacheStore::new(5);
        for i in 0..100 {
            cache.put(format!("key{i}"), payload(b"v"));
            assert!(cache.len() <= 5);
        }
    }

    #[test]
    fn test_zero_capacity_caches_nothing() {
        let cache = CacheStore::new(0);
        cache.put("A".to_string(), payload(b"a"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_matching() {
        let cache = CacheStore::new(10);
        cache.put("SELECT * FROM users[]".to_string(), payload(b"1"));
        cache.put("SELECT * FROM users WHERE id = $1[1]".to_string(), payload(b"2"));
        cache.put("SELECT * FROM orders[]".to_string(), payload(b"3"));

        let removed = cache.invalidate_matching(|key| key.contains("users"));

        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.contains_key("SELECT * FROM orders[]"));
        assert_eq!(cache.stats().invalidations, 2);
    }

    #[test]
    fn test_evict_oldest_count() {
        let cache = CacheStore::new(10);
        for key in ["a", "b", "c", "d"] {
            cache.put(key.to_string(), payload(b"v"));
        }
        cache.get("a");

        assert_eq!(cache.evict_oldest(2), 2);
        assert!(cache.contains_key("a"));
        assert!(cache.contains_key("d"));
        assert!(!cache.contains_key("b"));
        assert!(!cache.contains_key("c"));
    }

    #[test]
    fn test_trim_overflow() {
        let cache = CacheStore::new(4);
        for key in ["a", "b", "c", "d", "e", "f", "g", "h"] {
            cache.force_insert(key);
        }
        assert_eq!(cache.len(), 8);

        // 8 entries over a capacity of 4: a quarter is not enough, trim down to capacity
        assert_eq!(cache.trim_overflow(), 4);
        assert_eq!(cache.len(), 4);
        assert!(cache.contains_key("h"));
        assert!(!cache.contains_key("a"));

        assert_eq!(cache.trim_overflow(), 0);
    }

    #[test]
    fn test_clear() {
        let cache = CacheStore::new(10);
        cache.put("k1".to_string(), payload(b"1"));
        cache.put("k2".to_string(), payload(b"2"));

        assert_eq!(cache.clear(), 2);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_put_after_invalidation_is_refused() {
        let cache = CacheStore::new(10);
        let before = cache.generation();

        // A write lands while the read is still being fetched
        cache.invalidate_matching(|key| key.contains("users"));

        let key = "SELECT * FROM users[]".to_string();
        assert!(!cache.put_if_current(key.clone(), payload(b"old"), before));
        assert!(cache.is_empty());

        let now = cache.generation();
        assert!(cache.put_if_current(key.clone(), payload(b"new"), now));
        assert_eq!(&cache.get(&key).unwrap()[..], b"new");

        cache.clear();
        assert_ne!(cache.generation(), now);
    }
}
