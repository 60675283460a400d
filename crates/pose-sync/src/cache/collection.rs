//! Two-layer cache for per-set image listings.
//!
//! Reads hit the in-memory map first and fall through to the durable
//! `CollectionStore`, repopulating memory on a durable hit. Expired entries
//! are purged lazily when a read finds them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::CacheError;
use crate::image_index::ImageItem;

use super::{is_expired, ttl_ms, ReadOptions};

// ============================================================================
// Entry & durable store
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionCacheEntry {
    pub owner_id: String,
    /// When the entry was written, in epoch milliseconds.
    pub updated_at_ms: i64,
    pub items: Vec<ImageItem>,
}

/// Async durable storage for collection entries.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CollectionCacheEntry>, CacheError>;

    /// Fails with `CacheError::QuotaExceeded` when the store is full.
    async fn put(&self, key: &str, entry: &CollectionCacheEntry) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// `(key, updated_at_ms)` for every stored entry.
    async fn ages(&self) -> Result<Vec<(String, i64)>, CacheError>;
}

/// In-memory `CollectionStore` whose quota is a cap on the total number of
/// items across all entries.
#[derive(Default)]
pub struct MemoryCollectionStore {
    entries: Mutex<HashMap<String, CollectionCacheEntry>>,
    max_items: Option<usize>,
    gets: AtomicUsize,
}

impl MemoryCollectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_items(max_items: usize) -> Self {
        Self {
            max_items: Some(max_items),
            ..Self::default()
        }
    }

    /// Number of durable reads served so far.
    pub fn get_calls(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CollectionStore for MemoryCollectionStore {
    async fn get(&self, key: &str) -> Result<Option<CollectionCacheEntry>, CacheError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn put(&self, key: &str, entry: &CollectionCacheEntry) -> Result<(), CacheError> {
        let mut entries = self.entries.lock();
        if let Some(max) = self.max_items {
            let others: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, e)| e.items.len())
                .sum();
            if others + entry.items.len() > max {
                return Err(CacheError::QuotaExceeded {
                    key: key.to_string(),
                });
            }
        }
        entries.insert(key.to_string(), entry.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn ages(&self) -> Result<Vec<(String, i64)>, CacheError> {
        Ok(self
            .entries
            .lock()
            .iter()
            .map(|(k, e)| (k.clone(), e.updated_at_ms))
            .collect())
    }
}

// ============================================================================
// CollectionCache
// ============================================================================

pub struct CollectionCache {
    memory: Mutex<HashMap<String, Arc<CollectionCacheEntry>>>,
    durable: Arc<dyn CollectionStore>,
    prefix: String,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
}

impl CollectionCache {
    pub fn new(
        durable: Arc<dyn CollectionStore>,
        config: &SyncConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            memory: Mutex::new(HashMap::new()),
            durable,
            prefix: config.collection_key_prefix(),
            ttl_ms: ttl_ms(config.collection_ttl()),
            clock,
        }
    }

    pub fn durable_key(&self, owner_id: &str) -> String {
        format!("{}{owner_id}", self.prefix)
    }

    pub async fn read(&self, owner_id: &str, opts: ReadOptions) -> Option<Arc<CollectionCacheEntry>> {
        let now = self.clock.now_ms();

        let in_memory = self.memory.lock().get(owner_id).cloned();
        if let Some(entry) = in_memory {
            if opts.allow_stale || !is_expired(entry.updated_at_ms, now, self.ttl_ms) {
                return Some(entry);
            }
            tracing::debug!(owner_id, "collection entry expired in memory");
            self.purge(owner_id).await;
            return None;
        }

        let key = self.durable_key(owner_id);
        let entry = match self.durable.get(&key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(%key, "collection cache read failed: {err}");
                return None;
            }
        };

        if !opts.allow_stale && is_expired(entry.updated_at_ms, now, self.ttl_ms) {
            tracing::debug!(%key, "purging expired collection entry");
            if let Err(err) = self.durable.delete(&key).await {
                tracing::warn!(%key, "failed to purge expired collection entry: {err}");
            }
            return None;
        }

        let entry = Arc::new(entry);
        self.memory
            .lock()
            .insert(owner_id.to_string(), Arc::clone(&entry));
        Some(entry)
    }

    /// Cache `items` for `owner_id`. The in-memory layer always takes the
    /// entry; the return value reports whether the durable layer did too.
    pub async fn write(&self, owner_id: &str, items: Vec<ImageItem>) -> bool {
        let entry = CollectionCacheEntry {
            owner_id: owner_id.to_string(),
            updated_at_ms: self.clock.now_ms(),
            items,
        };
        let key = self.durable_key(owner_id);

        let durable_result = self.durable.put(&key, &entry).await;
        self.memory
            .lock()
            .insert(owner_id.to_string(), Arc::new(entry.clone()));

        match durable_result {
            Ok(()) => true,
            Err(err) if err.is_quota() => {
                let evicted = self.evict_oldest(&key).await;
                tracing::warn!(%key, evicted, "collection cache over quota, retrying");
                match self.durable.put(&key, &entry).await {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::warn!(%key, "collection cache write skipped: {err}");
                        false
                    }
                }
            }
            Err(err) => {
                tracing::warn!(%key, "collection cache write skipped: {err}");
                false
            }
        }
    }

    /// Remove an owner's entry from both layers.
    pub async fn invalidate(&self, owner_id: &str) {
        self.purge(owner_id).await;
    }

    /// Drop the in-memory layer only.
    pub fn clear_memory(&self) {
        self.memory.lock().clear();
    }

    async fn purge(&self, owner_id: &str) {
        self.memory.lock().remove(owner_id);
        let key = self.durable_key(owner_id);
        if let Err(err) = self.durable.delete(&key).await {
            tracing::warn!(%key, "failed to delete collection entry: {err}");
        }
    }

    /// Evict the oldest quarter of durable entries (at least one), never
    /// touching `keep`. Evicted owners leave the memory layer too.
    async fn evict_oldest(&self, keep: &str) -> usize {
        let mut ages = match self.durable.ages().await {
            Ok(ages) => ages,
            Err(err) => {
                tracing::warn!("cannot list collection entries for eviction: {err}");
                return 0;
            }
        };
        ages.retain(|(key, _)| key != keep);
        ages.sort_by_key(|(_, written)| *written);

        let target = ages.len().div_ceil(4).max(1).min(ages.len());
        let mut evicted = 0;
        for (key, _) in ages.into_iter().take(target) {
            match self.durable.delete(&key).await {
                Ok(()) => {
                    if let Some(owner_id) = key.strip_prefix(&self.prefix) {
                        self.memory.lock().remove(owner_id);
                    }
                    evicted += 1;
                }
                Err(err) => tracing::warn!(%key, "eviction failed: {err}"),
            }
        }
        evicted
    }
}
