//! Synchronous cache tier for the document snapshot.

use std::sync::Arc;

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::document::DocumentSnapshot;

use super::kv::{evict_except, KeyValueStore};
use super::{is_expired, ttl_ms, CacheEnvelope, ReadOptions};

pub struct DocumentCache {
    kv: Arc<dyn KeyValueStore>,
    key: String,
    /// Keys that survive a quota eviction besides our own.
    protected: Vec<String>,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
}

impl DocumentCache {
    pub fn new(kv: Arc<dyn KeyValueStore>, config: &SyncConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            kv,
            key: config.document_cache_key(),
            protected: vec![config.dirty_flag_key()],
            ttl_ms: ttl_ms(config.document_ttl()),
            clock,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// `None` on miss, on an undecodable entry, or (unless `allow_stale`)
    /// once the TTL has elapsed.
    pub fn read(&self, opts: ReadOptions) -> Option<DocumentSnapshot> {
        let raw = match self.kv.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(key = %self.key, "document cache read failed: {err}");
                return None;
            }
        };

        let envelope: CacheEnvelope<DocumentSnapshot> = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(err) => {
                tracing::warn!(key = %self.key, "dropping unreadable document cache entry: {err}");
                let _ = self.kv.remove(&self.key);
                return None;
            }
        };

        if !opts.allow_stale && is_expired(envelope.cached_at, self.clock.now_ms(), self.ttl_ms) {
            tracing::debug!(key = %self.key, "document cache entry expired");
            return None;
        }

        Some(envelope.value)
    }

    /// Returns `false` when the snapshot could not be cached even after
    /// evicting every other key in the store.
    pub fn write(&self, snapshot: &DocumentSnapshot) -> bool {
        let envelope = CacheEnvelope {
            cached_at: self.clock.now_ms(),
            value: snapshot,
        };
        let raw = match serde_json::to_string(&envelope) {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(key = %self.key, "document snapshot not serializable: {err}");
                return false;
            }
        };

        match self.kv.set(&self.key, &raw) {
            Ok(()) => true,
            Err(err) if err.is_quota() => {
                let evicted = self.evict_secondary();
                tracing::warn!(key = %self.key, evicted, "document cache over quota, retrying");
                match self.kv.set(&self.key, &raw) {
                    Ok(()) => true,
                    Err(err) => {
                        tracing::warn!(key = %self.key, "document cache write skipped: {err}");
                        false
                    }
                }
            }
            Err(err) => {
                tracing::warn!(key = %self.key, "document cache write skipped: {err}");
                false
            }
        }
    }

    pub fn clear(&self) {
        if let Err(err) = self.kv.remove(&self.key) {
            tracing::warn!(key = %self.key, "document cache clear failed: {err}");
        }
    }

    /// Drop every key that is neither the document snapshot nor protected.
    fn evict_secondary(&self) -> usize {
        let mut keep = self.protected.clone();
        keep.push(self.key.clone());
        evict_except(self.kv.as_ref(), &keep)
    }
}
