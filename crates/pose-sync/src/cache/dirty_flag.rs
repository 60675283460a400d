//! Durable "unsynced edits exist" marker that survives reloads.

use std::sync::Arc;

use super::kv::{evict_except, KeyValueStore};

pub struct DirtyFlag {
    kv: Arc<dyn KeyValueStore>,
    key: String,
    /// Keys that survive when setting the flag has to make room.
    protected: Vec<String>,
}

impl DirtyFlag {
    pub fn new(kv: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        Self {
            kv,
            key: key.into(),
            protected: Vec::new(),
        }
    }

    /// Keep `key` when a quota error forces an eviction.
    pub fn protecting(mut self, key: impl Into<String>) -> Self {
        self.protected.push(key.into());
        self
    }

    /// A missing or unreadable flag reads as clean.
    pub fn load(&self) -> bool {
        match self.kv.get(&self.key) {
            Ok(value) => value.as_deref() == Some("1"),
            Err(err) => {
                tracing::warn!(key = %self.key, "dirty flag unreadable, assuming clean: {err}");
                false
            }
        }
    }

    /// Returns whether the flag was persisted. Setting it on a full store
    /// evicts every unprotected key and retries once.
    pub fn store(&self, dirty: bool) -> bool {
        let result = if dirty {
            match self.kv.set(&self.key, "1") {
                Err(err) if err.is_quota() => {
                    let mut keep = self.protected.clone();
                    keep.push(self.key.clone());
                    let evicted = evict_except(self.kv.as_ref(), &keep);
                    tracing::warn!(key = %self.key, evicted, "dirty flag over quota, retrying");
                    self.kv.set(&self.key, "1")
                }
                result => result,
            }
        } else {
            self.kv.remove(&self.key)
        };
        match result {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(key = %self.key, dirty, "dirty flag not persisted: {err}");
                false
            }
        }
    }
}
