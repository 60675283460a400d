//! Remote storage traits.
//!
//! `BlobStore` is the narrow black-box object store (list/download/upload by
//! id). `RemoteDocumentStore` is the document-level contract the coordinator
//! talks to; `BlobDocumentStore` bridges the two.

use async_trait::async_trait;

use crate::document::Document;
use crate::error::StoreError;

// ============================================================================
// BlobStore
// ============================================================================

/// Metadata for one remote object. Never includes the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobMeta {
    pub id: String,
    pub name: String,
    /// Remote-assigned content hash.
    pub fingerprint: Option<String>,
    /// RFC 3339 timestamp of the last write.
    pub last_modified: Option<String>,
}

/// Opaque remote object store. Last write wins at this level; conflict
/// resolution happens in the coordinator.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Metadata-only lookup by object name.
    async fn find(&self, name: &str) -> Result<Option<BlobMeta>, StoreError>;

    /// Full body read. Missing ids yield `StoreError::NotFound`.
    async fn download(&self, id: &str) -> Result<(BlobMeta, Vec<u8>), StoreError>;

    /// Full overwrite of `id`, or creation of a new object when `id` is `None`.
    async fn upload(
        &self,
        id: Option<&str>,
        name: &str,
        body: Vec<u8>,
    ) -> Result<BlobMeta, StoreError>;
}

// ============================================================================
// RemoteDocumentStore
// ============================================================================

/// Result of a metadata-only probe.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Probe {
    pub exists: bool,
    pub remote_id: Option<String>,
    pub fingerprint: Option<String>,
    pub last_modified: Option<String>,
}

impl Probe {
    pub fn absent() -> Self {
        Self::default()
    }
}

impl From<BlobMeta> for Probe {
    fn from(meta: BlobMeta) -> Self {
        Self {
            exists: true,
            remote_id: Some(meta.id),
            fingerprint: meta.fingerprint,
            last_modified: meta.last_modified,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedDocument {
    pub remote_id: String,
    pub document: Document,
    pub fingerprint: Option<String>,
    pub last_modified: Option<String>,
}

/// What the store reports after a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    pub remote_id: String,
    pub fingerprint: Option<String>,
    pub last_modified: Option<String>,
}

impl From<BlobMeta> for WriteReceipt {
    fn from(meta: BlobMeta) -> Self {
        Self {
            remote_id: meta.id,
            fingerprint: meta.fingerprint,
            last_modified: meta.last_modified,
        }
    }
}

/// The single authoritative document, addressed as a whole.
#[async_trait]
pub trait RemoteDocumentStore: Send + Sync {
    /// Existence and fingerprint without transferring the body.
    async fn probe(&self) -> Result<Probe, StoreError>;

    /// Full read. `Ok(None)` when the document does not exist; an undecodable
    /// body is `Err(StoreError::Corrupt)`.
    async fn fetch(&self) -> Result<Option<FetchedDocument>, StoreError>;

    /// Full overwrite; `remote_id == None` creates a new remote object.
    async fn write(
        &self,
        remote_id: Option<&str>,
        document: &Document,
    ) -> Result<WriteReceipt, StoreError>;
}
