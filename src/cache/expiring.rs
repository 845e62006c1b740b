//! Expiring cache over a pluggable key-value store.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::CacheSettings;

use super::store::KeyValueStore;

/// Default time-to-live for cache entries: one hour.
pub const DEFAULT_TTL_MS: u64 = 3_600_000;

/// Default key namespace. Every entry the cache writes carries this prefix
/// so bulk operations never touch unrelated data in a shared store.
pub const DEFAULT_PREFIX: &str = "floodgate_";

/// The stored shape of one cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    data: T,
    timestamp: u64,
}

/// Summary of the cache's footprint in its store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Namespaced keys currently present, prefix stripped
    pub keys: Vec<String>,
    /// Summed serialized size of stored values, e.g. "12.34 KB"
    pub size: String,
}

/// A key/value cache that treats entries older than a fixed TTL as absent.
///
/// Values round-trip through JSON into the underlying store as a
/// `{data, timestamp}` envelope. Eviction is lazy: an expired entry is
/// removed when a read finds it, never by a background sweep. Storage
/// failures degrade to cache misses; no operation here returns an error or
/// panics across the public boundary.
pub struct ExpiringCache<S, C = SystemClock>
where
    S: KeyValueStore,
    C: Clock,
{
    store: S,
    clock: C,
    prefix: String,
    ttl_ms: u64,
}

impl<S> ExpiringCache<S, SystemClock>
where
    S: KeyValueStore,
{
    /// Create a cache on the system clock with the default namespace and
    /// one-hour TTL.
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S, C> ExpiringCache<S, C>
where
    S: KeyValueStore,
    C: Clock,
{
    /// Create a cache with an injected clock.
    pub fn with_clock(store: S, clock: C) -> Self {
        Self {
            store,
            clock,
            prefix: DEFAULT_PREFIX.to_string(),
            ttl_ms: DEFAULT_TTL_MS,
        }
    }

    /// Create a cache from configuration.
    pub fn with_settings(store: S, clock: C, settings: &CacheSettings) -> Self {
        Self {
            store,
            clock,
            prefix: settings.prefix.clone(),
            ttl_ms: settings.ttl_ms,
        }
    }

    /// Override the namespace prefix. Callers wanting several isolated
    /// caches over one store give each its own prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Override the TTL. The TTL applies uniformly to every entry; callers
    /// needing per-entry lifetimes use separate cache instances.
    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = ttl_ms;
        self
    }

    /// The configured TTL in milliseconds.
    pub fn ttl_ms(&self) -> u64 {
        self.ttl_ms
    }

    /// The configured namespace prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Cache a value under `key`, overwriting unconditionally.
    ///
    /// A serialization or storage failure is logged and swallowed; the
    /// entry is simply not cached and the next read misses.
    pub fn set<T>(&self, key: &str, data: &T)
    where
        T: Serialize,
    {
        let envelope = Envelope {
            data,
            timestamp: self.clock.now_millis(),
        };
        let json = match serde_json::to_string(&envelope) {
            Ok(json) => json,
            Err(e) => {
                warn!(key, error = %e, "Failed to serialize cache entry, skipping write");
                return;
            }
        };
        if let Err(e) = self.store.set(&self.storage_key(key), &json) {
            warn!(key, error = %e, "Failed to write cache entry");
        }
    }

    /// Read a fresh value for `key`, or `None`.
    ///
    /// An absent key, an unreadable stored value, and an entry past the
    /// TTL all read as `None`; the expired case also removes the entry.
    pub fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let storage_key = self.storage_key(key);
        let raw = self.store.get(&storage_key)?;

        let envelope: Envelope<T> = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(key, error = %e, "Unreadable cache entry, treating as miss");
                return None;
            }
        };

        let now = self.clock.now_millis();
        if now.saturating_sub(envelope.timestamp) > self.ttl_ms {
            debug!(key, "Evicting expired cache entry");
            self.store.remove(&storage_key);
            return None;
        }

        trace!(key, "Cache hit");
        Some(envelope.data)
    }

    /// Remove one entry. No error if absent.
    pub fn clear(&self, key: &str) {
        self.store.remove(&self.storage_key(key));
    }

    /// Remove every entry under this cache's prefix, leaving unrelated
    /// keys in the store untouched.
    pub fn clear_all(&self) {
        for key in self.store.keys() {
            if key.starts_with(&self.prefix) {
                self.store.remove(&key);
            }
        }
    }

    /// Enumerate the cache's keys and summed stored size.
    ///
    /// Eviction being lazy, the numbers may transiently include entries
    /// that are expired but not yet read.
    pub fn stats(&self) -> CacheStats {
        let mut keys = Vec::new();
        let mut total_bytes = 0usize;

        for key in self.store.keys() {
            if let Some(bare) = key.strip_prefix(&self.prefix) {
                if let Some(value) = self.store.get(&key) {
                    total_bytes += value.len();
                }
                keys.push(bare.to_string());
            }
        }
        keys.sort();

        CacheStats {
            keys,
            size: format_kb(total_bytes),
        }
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

fn format_kb(bytes: usize) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::MemoryStore;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("floodgate=trace")
            .with_test_writer()
            .try_init();
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        id: u32,
        tags: Vec<String>,
    }

    fn payload() -> Payload {
        Payload {
            id: 7,
            tags: vec!["a".to_string(), "b".to_string()],
        }
    }

    fn cache(clock: &ManualClock) -> ExpiringCache<Arc<MemoryStore>, ManualClock> {
        ExpiringCache::with_clock(Arc::new(MemoryStore::new()), clock.clone())
    }

    #[test]
    fn test_round_trip_preserves_structure() {
        let clock = ManualClock::new(0);
        let cache = cache(&clock);

        cache.set("k", &payload());
        assert_eq!(cache.get::<Payload>("k"), Some(payload()));
    }

    #[test]
    fn test_absent_key_is_none() {
        let clock = ManualClock::new(0);
        let cache = cache(&clock);

        assert_eq!(cache.get::<Payload>("missing"), None);
    }

    #[test]
    fn test_entry_at_exact_ttl_is_still_fresh() {
        let clock = ManualClock::new(0);
        let cache = cache(&clock);

        cache.set("k", &payload());
        clock.set(DEFAULT_TTL_MS);
        assert!(cache.get::<Payload>("k").is_some());
    }

    #[test]
    fn test_expired_entry_is_evicted() {
        let clock = ManualClock::new(0);
        let store = Arc::new(MemoryStore::new());
        let cache = ExpiringCache::with_clock(store.clone(), clock.clone());

        cache.set("k", &payload());
        clock.set(DEFAULT_TTL_MS + 1);

        assert_eq!(cache.get::<Payload>("k"), None);
        // Eviction removed the entry from the underlying store.
        assert_eq!(store.get("floodgate_k"), None);
    }

    #[test]
    fn test_overwrite_resets_timestamp() {
        let clock = ManualClock::new(0);
        let cache = cache(&clock);

        cache.set("k", &payload());
        clock.set(3_000_000);
        cache.set("k", &payload());

        // Older than TTL relative to the first write, fresh relative to
        // the second.
        clock.set(DEFAULT_TTL_MS + 1);
        assert!(cache.get::<Payload>("k").is_some());
    }

    #[test]
    fn test_unreadable_entry_is_a_miss() {
        init_tracing();
        let clock = ManualClock::new(0);
        let store = Arc::new(MemoryStore::new());
        let cache = ExpiringCache::with_clock(store.clone(), clock.clone());

        store.set("floodgate_bad", "not json").unwrap();
        assert_eq!(cache.get::<Payload>("bad"), None);
    }

    #[test]
    fn test_clear_removes_single_entry() {
        let clock = ManualClock::new(0);
        let cache = cache(&clock);

        cache.set("a", &1u32);
        cache.set("b", &2u32);
        cache.clear("a");

        assert_eq!(cache.get::<u32>("a"), None);
        assert_eq!(cache.get::<u32>("b"), Some(2));
    }

    #[test]
    fn test_clear_all_respects_namespace() {
        let clock = ManualClock::new(0);
        let store = Arc::new(MemoryStore::new());
        let cache = ExpiringCache::with_clock(store.clone(), clock.clone());

        cache.set("a", &1u32);
        cache.set("b", &2u32);
        store.set("other_app_data", "keep me").unwrap();

        cache.clear_all();

        assert_eq!(cache.get::<u32>("a"), None);
        assert_eq!(cache.get::<u32>("b"), None);
        assert_eq!(store.get("other_app_data"), Some("keep me".to_string()));
    }

    #[test]
    fn test_stats_strips_prefix_and_sums_sizes() {
        let clock = ManualClock::new(0);
        let store = Arc::new(MemoryStore::new());
        let cache = ExpiringCache::with_clock(store.clone(), clock.clone());

        // Two values of exactly 1024 bytes each, written directly so the
        // sizes are known.
        store.set("floodgate_a", &"x".repeat(1024)).unwrap();
        store.set("floodgate_b", &"y".repeat(1024)).unwrap();
        store.set("other_app_data", "ignored").unwrap();

        let stats = cache.stats();
        assert_eq!(stats.keys, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(stats.size, "2.00 KB");
    }

    #[test]
    fn test_stats_size_has_two_decimals() {
        let clock = ManualClock::new(0);
        let store = Arc::new(MemoryStore::new());
        let cache = ExpiringCache::with_clock(store.clone(), clock.clone());

        store.set("floodgate_a", &"x".repeat(512)).unwrap();

        assert_eq!(cache.stats().size, "0.50 KB");
    }

    #[test]
    fn test_quota_failure_degrades_to_miss() {
        init_tracing();
        let clock = ManualClock::new(0);
        let store = Arc::new(MemoryStore::with_quota(8));
        let cache = ExpiringCache::with_clock(store, clock.clone());

        // The envelope never fits in eight bytes; set swallows the error.
        cache.set("k", &payload());
        assert_eq!(cache.get::<Payload>("k"), None);
    }

    #[test]
    fn test_distinct_prefixes_isolate_caches() {
        let clock = ManualClock::new(0);
        let store = Arc::new(MemoryStore::new());
        let lessons =
            ExpiringCache::with_clock(store.clone(), clock.clone()).with_prefix("lessons_");
        let scores =
            ExpiringCache::with_clock(store.clone(), clock.clone()).with_prefix("scores_");

        lessons.set("k", &1u32);
        scores.set("k", &2u32);

        lessons.clear_all();

        assert_eq!(lessons.get::<u32>("k"), None);
        assert_eq!(scores.get::<u32>("k"), Some(2));
    }

    #[test]
    fn test_settings_apply_prefix_and_ttl() {
        let clock = ManualClock::new(0);
        let settings = CacheSettings {
            prefix: "app_".to_string(),
            ttl_ms: 2_000,
        };
        let store = Arc::new(MemoryStore::new());
        let cache = ExpiringCache::with_settings(store.clone(), clock.clone(), &settings);

        cache.set("k", &1u32);
        assert!(store.get("app_k").is_some());

        clock.set(2_001);
        assert_eq!(cache.get::<u32>("k"), None);
    }

    #[test]
    fn test_custom_ttl_applies() {
        let clock = ManualClock::new(0);
        let store = Arc::new(MemoryStore::new());
        let cache = ExpiringCache::with_clock(store, clock.clone()).with_ttl_ms(1_000);

        cache.set("k", &1u32);
        clock.set(1_001);
        assert_eq!(cache.get::<u32>("k"), None);
    }
}
