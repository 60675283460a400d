//! Synchronous durable key-value storage (the on-device tier for the
//! document snapshot and the dirty flag).

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::error::CacheError;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Fails with `CacheError::QuotaExceeded` when the store is full.
    fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    fn remove(&self, key: &str) -> Result<(), CacheError>;

    fn keys(&self) -> Result<Vec<String>, CacheError>;
}

/// In-memory `KeyValueStore` with an optional byte quota (keys + values).
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn used_bytes(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        if let Some(quota) = self.quota_bytes {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if others + key.len() + value.len() > quota {
                return Err(CacheError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}

/// Remove every key not in `keep`. Used to free room after a quota error.
pub fn evict_except(kv: &dyn KeyValueStore, keep: &[String]) -> usize {
    let keys = match kv.keys() {
        Ok(keys) => keys,
        Err(err) => {
            tracing::warn!("cannot list cache keys for eviction: {err}");
            return 0;
        }
    };
    let mut evicted = 0;
    for key in keys.into_iter().filter(|key| !keep.contains(key)) {
        match kv.remove(&key) {
            Ok(()) => evicted += 1,
            Err(err) => tracing::warn!(%key, "eviction failed: {err}"),
        }
    }
    evicted
}
