//! The authoritative pose-set document and its wire format.
//!
//! On the wire a document is `{ "version": 1, "sets": [...] }`. Decoding
//! reads `version` first and dispatches on it; unknown versions are rejected
//! rather than guessed at.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::DocumentError;

/// The only document schema this crate reads and writes.
pub const DOCUMENT_VERSION: u64 = 1;

// ============================================================================
// PoseSet
// ============================================================================

/// A curated set of photos. `id` is immutable and is the merge key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoseSet {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Milliseconds since the epoch, stamped by the coordinator on every
    /// local mutation. Missing is treated as 0 when merging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<i64>,
    /// Domain fields this crate does not interpret (folder ids, cover image,
    /// favorites, ...). Preserved verbatim through every round trip.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PoseSet {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            tags: BTreeSet::new(),
            updated_at: None,
            extra: Map::new(),
        }
    }

    pub fn with_updated_at(mut self, updated_at: i64) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn updated_at_or_epoch(&self) -> i64 {
        self.updated_at.unwrap_or(0)
    }
}

// ============================================================================
// Document
// ============================================================================

/// In-memory form of the document. Always current-version; legacy shapes are
/// upgraded during decode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub sets: Vec<PoseSet>,
}

#[derive(Deserialize)]
struct DocumentV1 {
    #[serde(default)]
    sets: Vec<PoseSet>,
}

#[derive(Serialize)]
struct DocumentWire<'a> {
    version: u64,
    sets: &'a [PoseSet],
}

impl Document {
    pub fn new(sets: Vec<PoseSet>) -> Self {
        Self { sets }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DocumentError> {
        let raw: Value = serde_json::from_slice(bytes)?;
        Self::from_value(raw)
    }

    pub fn from_value(raw: Value) -> Result<Self, DocumentError> {
        let version = raw
            .get("version")
            .and_then(Value::as_u64)
            .ok_or(DocumentError::MissingVersion)?;

        let document = match version {
            1 => {
                let wire: DocumentV1 = serde_json::from_value(raw)?;
                Document { sets: wire.sets }
            }
            other => return Err(DocumentError::UnsupportedVersion(other)),
        };

        document.check_unique_ids()?;
        Ok(document)
    }

    pub fn encode(&self) -> Result<Vec<u8>, DocumentError> {
        Ok(serde_json::to_vec(&self.wire())?)
    }

    fn wire(&self) -> DocumentWire<'_> {
        DocumentWire {
            version: DOCUMENT_VERSION,
            sets: &self.sets,
        }
    }

    pub fn check_unique_ids(&self) -> Result<(), DocumentError> {
        let mut seen = HashSet::with_capacity(self.sets.len());
        for set in &self.sets {
            if !seen.insert(set.id.as_str()) {
                return Err(DocumentError::DuplicateId(set.id.clone()));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.sets.iter().position(|s| s.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&PoseSet> {
        self.sets.iter().find(|s| s.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PoseSet> {
        self.sets.iter_mut().find(|s| s.id == id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sets.iter().map(|s| s.id.as_str())
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.wire().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Document::from_value(raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// DocumentSnapshot
// ============================================================================

/// A document together with the remote metadata it was last synced against.
/// This is what the document cache tier stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSnapshot {
    pub document: Document,
    #[serde(default)]
    pub remote_id: Option<String>,
    /// Remote content hash; equality means the remote body is unchanged.
    #[serde(default)]
    pub fingerprint: Option<String>,
    #[serde(default)]
    pub last_modified: Option<String>,
}
