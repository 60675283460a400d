//! `RemoteDocumentStore` over any `BlobStore`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::document::Document;
use crate::error::StoreError;

use super::traits::{BlobStore, FetchedDocument, Probe, RemoteDocumentStore, WriteReceipt};

pub struct BlobDocumentStore {
    blobs: Arc<dyn BlobStore>,
    name: String,
}

impl BlobDocumentStore {
    pub fn new(blobs: Arc<dyn BlobStore>, name: impl Into<String>) -> Self {
        Self {
            blobs,
            name: name.into(),
        }
    }
}

#[async_trait]
impl RemoteDocumentStore for BlobDocumentStore {
    async fn probe(&self) -> Result<Probe, StoreError> {
        Ok(self
            .blobs
            .find(&self.name)
            .await?
            .map(Probe::from)
            .unwrap_or_else(Probe::absent))
    }

    async fn fetch(&self) -> Result<Option<FetchedDocument>, StoreError> {
        let Some(meta) = self.blobs.find(&self.name).await? else {
            return Ok(None);
        };

        let (meta, body) = match self.blobs.download(&meta.id).await {
            Ok(found) => found,
            // Deleted between the lookup and the download.
            Err(StoreError::NotFound(_)) => return Ok(None),
            Err(err) => return Err(err),
        };

        let document = Document::decode(&body).map_err(|err| StoreError::Corrupt {
            remote_id: meta.id.clone(),
            reason: err.to_string(),
        })?;

        Ok(Some(FetchedDocument {
            remote_id: meta.id,
            document,
            fingerprint: meta.fingerprint,
            last_modified: meta.last_modified,
        }))
    }

    async fn write(
        &self,
        remote_id: Option<&str>,
        document: &Document,
    ) -> Result<WriteReceipt, StoreError> {
        let body = document
            .encode()
            .map_err(|err| StoreError::Encode(err.to_string()))?;

        match self.blobs.upload(remote_id, &self.name, body.clone()).await {
            Ok(meta) => Ok(meta.into()),
            Err(StoreError::NotFound(id)) if remote_id.is_some() => {
                tracing::warn!(remote_id = %id, "remote document vanished, creating a new one");
                Ok(self.blobs.upload(None, &self.name, body).await?.into())
            }
            Err(err) => Err(err),
        }
    }
}
