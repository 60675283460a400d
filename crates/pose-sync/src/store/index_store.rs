//! Remote per-set image indexes, one object per set.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::SyncConfig;
use crate::error::StoreError;
use crate::image_index::ImageIndex;

use super::traits::{BlobMeta, BlobStore};

/// Source of authoritative image listings, consulted on collection-cache
/// misses.
#[async_trait]
pub trait ImageIndexSource: Send + Sync {
    /// `Ok(None)` when the set has no index yet.
    async fn fetch_index(&self, owner_id: &str) -> Result<Option<ImageIndex>, StoreError>;
}

pub struct ImageIndexStore {
    blobs: Arc<dyn BlobStore>,
    suffix: String,
}

impl ImageIndexStore {
    pub fn new(blobs: Arc<dyn BlobStore>, suffix: impl Into<String>) -> Self {
        Self {
            blobs,
            suffix: suffix.into(),
        }
    }

    pub fn from_config(blobs: Arc<dyn BlobStore>, config: &SyncConfig) -> Self {
        Self::new(blobs, config.index_suffix.clone())
    }

    fn object_name(&self, owner_id: &str) -> String {
        format!("{owner_id}{}", self.suffix)
    }

    /// Write `index` in the current wire shape, overwriting any existing
    /// object for the set.
    pub async fn publish(&self, owner_id: &str, index: &ImageIndex) -> Result<BlobMeta, StoreError> {
        let name = self.object_name(owner_id);
        let body = index
            .encode()
            .map_err(|err| StoreError::Encode(err.to_string()))?;
        let existing = self.blobs.find(&name).await?;
        self.blobs
            .upload(existing.as_ref().map(|m| m.id.as_str()), &name, body)
            .await
    }
}

#[async_trait]
impl ImageIndexSource for ImageIndexStore {
    async fn fetch_index(&self, owner_id: &str) -> Result<Option<ImageIndex>, StoreError> {
        let name = self.object_name(owner_id);
        let Some(meta) = self.blobs.find(&name).await? else {
            return Ok(None);
        };
        let (meta, body) = match self.blobs.download(&meta.id).await {
            Ok(found) => found,
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err),
        };
        ImageIndex::decode(&body)
            .map(Some)
            .map_err(|err| StoreError::Corrupt {
                remote_id: meta.id,
                reason: err.to_string(),
            })
    }
}
