//! Expiring response cache over pluggable local storage.

mod expiring;
mod store;

pub use expiring::{CacheStats, ExpiringCache, DEFAULT_PREFIX, DEFAULT_TTL_MS};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
