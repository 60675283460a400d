//! In-memory `BlobStore` with scripted failures and call counters.
//!
//! Behaves like the real object store closely enough to drive the
//! coordinator end to end: sequential ids, sha256 fingerprints, RFC 3339
//! last-modified stamps from the injected clock.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};

use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;

use super::traits::{BlobMeta, BlobStore};

/// Which operation a scripted failure applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobOp {
    Find,
    Download,
    Upload,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BlobCallCounts {
    pub find: usize,
    pub download: usize,
    pub upload: usize,
}

struct StoredBlob {
    meta: BlobMeta,
    body: Vec<u8>,
}

#[derive(Default)]
struct MemoryBlobInner {
    /// id → blob
    blobs: BTreeMap<String, StoredBlob>,
    next_id: u64,
    failures: Vec<(BlobOp, StoreError)>,
    calls: BlobCallCounts,
}

pub struct MemoryBlobStore {
    inner: Mutex<MemoryBlobInner>,
    clock: Arc<dyn Clock>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(MemoryBlobInner::default()),
            clock,
        }
    }

    /// Make the next call to `op` fail with `error`. Failures queue up in
    /// the order they were scripted.
    pub fn fail_next(&self, op: BlobOp, error: StoreError) {
        self.inner.lock().failures.push((op, error));
    }

    pub fn calls(&self) -> BlobCallCounts {
        self.inner.lock().calls
    }

    /// Write `body` under `name` without touching counters or scripted
    /// failures. Overwrites the first object with that name, if any.
    pub fn put_raw(&self, name: &str, body: Vec<u8>) -> BlobMeta {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        let existing = inner
            .blobs
            .values()
            .find(|b| b.meta.name == name)
            .map(|b| b.meta.id.clone());
        store_blob(&mut inner, existing, name, body, now)
    }

    pub fn body_of(&self, name: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .blobs
            .values()
            .find(|b| b.meta.name == name)
            .map(|b| b.body.clone())
    }

    pub fn meta_of(&self, name: &str) -> Option<BlobMeta> {
        self.inner
            .lock()
            .blobs
            .values()
            .find(|b| b.meta.name == name)
            .map(|b| b.meta.clone())
    }

    pub fn remove(&self, name: &str) -> bool {
        let mut inner = self.inner.lock();
        let id = inner
            .blobs
            .values()
            .find(|b| b.meta.name == name)
            .map(|b| b.meta.id.clone());
        match id {
            Some(id) => inner.blobs.remove(&id).is_some(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

fn take_failure(inner: &mut MemoryBlobInner, op: BlobOp) -> Option<StoreError> {
    let pos = inner.failures.iter().position(|(o, _)| *o == op)?;
    Some(inner.failures.remove(pos).1)
}

fn fingerprint(body: &[u8]) -> String {
    format!("{:x}", Sha256::digest(body))
}

fn format_ms(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn store_blob(
    inner: &mut MemoryBlobInner,
    id: Option<String>,
    name: &str,
    body: Vec<u8>,
    now_ms: i64,
) -> BlobMeta {
    let id = id.unwrap_or_else(|| {
        inner.next_id += 1;
        format!("blob-{}", inner.next_id)
    });
    let meta = BlobMeta {
        id: id.clone(),
        name: name.to_string(),
        fingerprint: Some(fingerprint(&body)),
        last_modified: Some(format_ms(now_ms)),
    };
    inner.blobs.insert(
        id,
        StoredBlob {
            meta: meta.clone(),
            body,
        },
    );
    meta
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn find(&self, name: &str) -> Result<Option<BlobMeta>, StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.find += 1;
        if let Some(err) = take_failure(&mut inner, BlobOp::Find) {
            return Err(err);
        }
        Ok(inner
            .blobs
            .values()
            .find(|b| b.meta.name == name)
            .map(|b| b.meta.clone()))
    }

    async fn download(&self, id: &str) -> Result<(BlobMeta, Vec<u8>), StoreError> {
        let mut inner = self.inner.lock();
        inner.calls.download += 1;
        if let Some(err) = take_failure(&mut inner, BlobOp::Download) {
            return Err(err);
        }
        inner
            .blobs
            .get(id)
            .map(|b| (b.meta.clone(), b.body.clone()))
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn upload(
        &self,
        id: Option<&str>,
        name: &str,
        body: Vec<u8>,
    ) -> Result<BlobMeta, StoreError> {
        let now = self.clock.now_ms();
        let mut inner = self.inner.lock();
        inner.calls.upload += 1;
        if let Some(err) = take_failure(&mut inner, BlobOp::Upload) {
            return Err(err);
        }
        if let Some(id) = id {
            if !inner.blobs.contains_key(id) {
                return Err(StoreError::NotFound(id.to_string()));
            }
        }
        Ok(store_blob(
            &mut inner,
            id.map(str::to_string),
            name,
            body,
            now,
        ))
    }
}
