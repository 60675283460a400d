//! Tunables for the coordinator and both cache tiers.
//!
//! Every field has a default, so an empty JSON object (or no config at all)
//! yields the stock behaviour. Environment overrides are applied on top and
//! invalid values are logged and ignored.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_DEBOUNCE_MS: u64 = 350;
pub const DEFAULT_TTL_SECS: u64 = 24 * 60 * 60;

/// Schema segment baked into document cache keys.
const DOCUMENT_KEY_SCHEMA: &str = "doc:v1";
/// Schema segment baked into collection cache keys.
const COLLECTION_KEY_SCHEMA: &str = "images:v2";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SyncConfig {
    /// Quiet period before a burst of mutations is flushed.
    pub debounce_ms: u64,
    pub document_ttl_secs: u64,
    pub collection_ttl_secs: u64,
    /// Prefix for every durable cache key.
    pub cache_namespace: String,
    /// Remote object name of the authoritative document.
    pub document_name: String,
    /// Appended to a set id to name its remote image index.
    pub index_suffix: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            document_ttl_secs: DEFAULT_TTL_SECS,
            collection_ttl_secs: DEFAULT_TTL_SECS,
            cache_namespace: "pose-sync".to_string(),
            document_name: "pose-sets.json".to_string(),
            index_suffix: ".images.json".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: SyncConfig = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_namespace.is_empty() {
            return Err(ConfigError::Invalid {
                field: "cacheNamespace",
                reason: "must not be empty".to_string(),
            });
        }
        if self.document_name.is_empty() {
            return Err(ConfigError::Invalid {
                field: "documentName",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Apply `POSE_SYNC_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup("POSE_SYNC_DEBOUNCE_MS") {
            match raw.parse::<u64>() {
                Ok(v) => self.debounce_ms = v,
                Err(err) => tracing::warn!("invalid POSE_SYNC_DEBOUNCE_MS, ignoring: {err}"),
            }
        }
        if let Some(raw) = lookup("POSE_SYNC_DOCUMENT_TTL_SECS") {
            match raw.parse::<u64>() {
                Ok(v) => self.document_ttl_secs = v,
                Err(err) => tracing::warn!("invalid POSE_SYNC_DOCUMENT_TTL_SECS, ignoring: {err}"),
            }
        }
        if let Some(raw) = lookup("POSE_SYNC_COLLECTION_TTL_SECS") {
            match raw.parse::<u64>() {
                Ok(v) => self.collection_ttl_secs = v,
                Err(err) => {
                    tracing::warn!("invalid POSE_SYNC_COLLECTION_TTL_SECS, ignoring: {err}")
                }
            }
        }
        if let Some(raw) = lookup("POSE_SYNC_CACHE_NAMESPACE") {
            if raw.is_empty() {
                tracing::warn!("empty POSE_SYNC_CACHE_NAMESPACE, ignoring");
            } else {
                self.cache_namespace = raw;
            }
        }
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn document_ttl(&self) -> Duration {
        Duration::from_secs(self.document_ttl_secs)
    }

    pub fn collection_ttl(&self) -> Duration {
        Duration::from_secs(self.collection_ttl_secs)
    }

    pub fn document_cache_key(&self) -> String {
        format!("{}:{}", self.cache_namespace, DOCUMENT_KEY_SCHEMA)
    }

    pub fn dirty_flag_key(&self) -> String {
        format!("{}:dirty", self.cache_namespace)
    }

    /// Prefix shared by every collection cache key.
    pub fn collection_key_prefix(&self) -> String {
        format!("{}:{}:", self.cache_namespace, COLLECTION_KEY_SCHEMA)
    }
}
