//! Per-set image listings served cache-first.

use std::sync::Arc;

use crate::cache::{CollectionCache, ReadOptions};
use crate::error::StoreError;
use crate::image_index::ImageItem;
use crate::store::ImageIndexSource;

#[derive(Debug, Clone, PartialEq)]
pub struct ImageList {
    pub owner_id: String,
    pub items: Vec<ImageItem>,
    /// Served from the collection cache without touching the remote.
    pub from_cache: bool,
}

pub struct ImageListLoader {
    source: Arc<dyn ImageIndexSource>,
    cache: Arc<CollectionCache>,
}

impl ImageListLoader {
    pub fn new(source: Arc<dyn ImageIndexSource>, cache: Arc<CollectionCache>) -> Self {
        Self { source, cache }
    }

    pub fn cache(&self) -> &Arc<CollectionCache> {
        &self.cache
    }

    /// Cached listing if fresh, otherwise the remote index.
    ///
    /// A missing or unreadable index yields an empty list that is not
    /// cached, so the next load asks the remote again. Other remote
    /// failures are returned.
    pub async fn load(&self, owner_id: &str) -> Result<ImageList, StoreError> {
        if let Some(entry) = self.cache.read(owner_id, ReadOptions::fresh()).await {
            return Ok(ImageList {
                owner_id: owner_id.to_string(),
                items: entry.items.clone(),
                from_cache: true,
            });
        }
        self.refresh(owner_id).await
    }

    /// Skip the cache and reload from the remote index. A missing or
    /// unreadable index also drops any cached listing for the set.
    pub async fn refresh(&self, owner_id: &str) -> Result<ImageList, StoreError> {
        let items = match self.source.fetch_index(owner_id).await {
            Ok(Some(index)) => index.items,
            Ok(None) => {
                tracing::debug!(owner_id, "no image index for set");
                self.cache.invalidate(owner_id).await;
                return Ok(Self::empty(owner_id));
            }
            Err(err) if err.is_absent() => {
                tracing::warn!(owner_id, "image index unreadable: {err}");
                self.cache.invalidate(owner_id).await;
                return Ok(Self::empty(owner_id));
            }
            Err(err) => return Err(err),
        };

        if !self.cache.write(owner_id, items.clone()).await {
            tracing::debug!(owner_id, "image listing served uncached");
        }
        Ok(ImageList {
            owner_id: owner_id.to_string(),
            items,
            from_cache: false,
        })
    }

    fn empty(owner_id: &str) -> ImageList {
        ImageList {
            owner_id: owner_id.to_string(),
            items: Vec::new(),
            from_cache: false,
        }
    }
}
