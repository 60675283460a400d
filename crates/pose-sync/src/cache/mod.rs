//! Tiered caching.
//!
//! Two independently configured tiers share the same read/write contract:
//!
//! - [`DocumentCache`]: small and synchronous, holds the authoritative
//!   document snapshot plus its fingerprint.
//! - [`CollectionCache`]: an in-memory map in front of a larger async
//!   durable store, holding per-set image listings.
//!
//! Reads never return an entry past its TTL unless the caller explicitly
//! allows stale data. Writes never fail the operation they support: quota
//! exhaustion triggers one eviction pass and one retry, after which the
//! write reports `false` and the caller carries on uncached.

pub mod collection;
pub mod dirty_flag;
pub mod document_cache;
pub mod kv;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use collection::{CollectionCache, CollectionCacheEntry, CollectionStore, MemoryCollectionStore};
pub use dirty_flag::DirtyFlag;
pub use document_cache::DocumentCache;
pub use kv::{KeyValueStore, MemoryKeyValueStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Return expired entries instead of treating them as misses.
    pub allow_stale: bool,
}

impl ReadOptions {
    pub fn fresh() -> Self {
        Self { allow_stale: false }
    }

    pub fn allow_stale() -> Self {
        Self { allow_stale: true }
    }
}

/// Durable wrapper recording when a value was written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CacheEnvelope<T> {
    pub cached_at: i64,
    pub value: T,
}

pub(crate) fn ttl_ms(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

/// An entry written at `written_at` is expired once `ttl_ms` has elapsed.
pub(crate) fn is_expired(written_at: i64, now: i64, ttl_ms: i64) -> bool {
    now.saturating_sub(written_at) >= ttl_ms
}
