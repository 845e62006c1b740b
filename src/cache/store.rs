//! Pluggable key-value backends for the expiring cache.
//!
//! The cache only needs a synchronous string-keyed, string-valued store
//! with enumerable keys. The store is injected so tests run against an
//! in-memory map and hosts pick whatever medium is local to them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::warn;

/// Errors surfaced by a storage backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The write would exceed the store's byte quota
    #[error("storage quota exceeded: write of {requested} bytes over {quota} byte quota")]
    QuotaExceeded { requested: usize, quota: usize },

    /// I/O errors from a persistent medium
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors from a persistent medium's on-disk image
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A synchronous string-keyed, string-valued store.
///
/// Writes are last-write-wins; readers may observe no value, a value about
/// to be removed, or a freshly written one. Nothing stronger is promised.
pub trait KeyValueStore: Send + Sync {
    /// Read a value. Absent keys are `None`, not an error.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, overwriting unconditionally.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key. No error if absent.
    fn remove(&self, key: &str);

    /// Enumerate every key currently present.
    fn keys(&self) -> Vec<String>;
}

/// A shared store handle is still a store, so several caches (each with
/// its own namespace) can sit over one medium.
impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }

    fn keys(&self) -> Vec<String> {
        (**self).keys()
    }
}

/// An in-memory store backed by a concurrent map.
///
/// The optional byte quota mimics the bounded media this store stands in
/// for during tests (browser local storage, mobile preference stores).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    /// Create an unbounded in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that rejects writes once keys plus values would
    /// exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: DashMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn used_bytes(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.key().len() + entry.value().len())
            .sum()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        if let Some(quota) = self.quota_bytes {
            let displaced = self
                .entries
                .get(key)
                .map(|v| key.len() + v.len())
                .unwrap_or(0);
            let requested = key.len() + value.len();
            if self.used_bytes() - displaced + requested > quota {
                return Err(StoreError::QuotaExceeded { requested, quota });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }
}

/// A store persisted as one JSON object in a single file.
///
/// The whole map is loaded at open and rewritten on each mutation, which is
/// proportionate for the small entry counts a client-side cache holds.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open a file store, loading the existing image if the file exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let json = serde_json::to_string(entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock();
        let previous = entries.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&entries) {
            // Keep memory and disk agreeing on failure.
            match previous {
                Some(v) => entries.insert(key.to_string(), v),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            if let Err(e) = self.persist(&entries) {
                warn!(key, error = %e, "Failed to persist removal");
            }
        }
    }

    fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }
}
