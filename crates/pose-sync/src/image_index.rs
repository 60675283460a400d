//! Per-set image listing stored as its own remote object.
//!
//! Two wire shapes exist. `version: 2` is current:
//! `{ version, updatedAt, count, items: [{ id, name, mimeType, ... }] }`.
//! `version: 1` carried only `items: [{ id, name }]`. Both decode into
//! [`ImageIndex`]; writes always produce version 2.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DocumentError;

pub const INDEX_VERSION: u64 = 2;

/// Lightweight listing entry for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

impl ImageItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: None,
            thumbnail_link: None,
            width: None,
            height: None,
        }
    }
}

/// Normalized (current-shape) image index.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageIndex {
    pub updated_at: DateTime<Utc>,
    pub items: Vec<ImageItem>,
}

// ----------------------------------------------------------------------------
// Wire shapes
// ----------------------------------------------------------------------------

#[derive(Deserialize)]
struct LegacyItem {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexV1 {
    #[serde(default)]
    items: Vec<LegacyItem>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexV2 {
    updated_at: String,
    /// Informational only; recomputed from `items`.
    #[serde(default)]
    #[allow(dead_code)]
    count: Option<usize>,
    #[serde(default)]
    items: Vec<ImageItem>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IndexWire<'a> {
    version: u64,
    updated_at: String,
    count: usize,
    items: &'a [ImageItem],
}

enum VersionedIndex {
    V1(IndexV1),
    V2(IndexV2),
}

impl VersionedIndex {
    fn parse(raw: Value) -> Result<Self, DocumentError> {
        let version = raw
            .get("version")
            .and_then(Value::as_u64)
            .ok_or(DocumentError::MissingVersion)?;
        match version {
            1 => Ok(VersionedIndex::V1(serde_json::from_value(raw)?)),
            2 => Ok(VersionedIndex::V2(serde_json::from_value(raw)?)),
            other => Err(DocumentError::UnsupportedVersion(other)),
        }
    }

    fn normalize(self) -> Result<ImageIndex, DocumentError> {
        let current = match self {
            VersionedIndex::V1(v1) => upgrade_v1(v1),
            VersionedIndex::V2(v2) => v2,
        };
        let updated_at = if current.updated_at.is_empty() {
            DateTime::<Utc>::default()
        } else {
            DateTime::parse_from_rfc3339(&current.updated_at)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|_| DocumentError::InvalidTimestamp(current.updated_at.clone()))?
        };
        Ok(ImageIndex {
            updated_at,
            items: current.items,
        })
    }
}

/// Legacy listings carry no timestamp; they normalize to the epoch so any
/// fresher listing wins.
fn upgrade_v1(v1: IndexV1) -> IndexV2 {
    let items = v1
        .items
        .into_iter()
        .map(|legacy| ImageItem::new(legacy.id, legacy.name))
        .collect::<Vec<_>>();
    IndexV2 {
        updated_at: String::new(),
        count: Some(items.len()),
        items,
    }
}

impl ImageIndex {
    pub fn new(updated_at: DateTime<Utc>, items: Vec<ImageItem>) -> Self {
        Self { updated_at, items }
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DocumentError> {
        let raw: Value = serde_json::from_slice(bytes)?;
        VersionedIndex::parse(raw)?.normalize()
    }

    pub fn encode(&self) -> Result<Vec<u8>, DocumentError> {
        let wire = IndexWire {
            version: INDEX_VERSION,
            updated_at: self.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            count: self.items.len(),
            items: &self.items,
        };
        Ok(serde_json::to_vec(&wire)?)
    }

    pub fn count(&self) -> usize {
        self.items.len()
    }
}
