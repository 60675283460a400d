//! Id-keyed, last-write-wins merge of a local and a remote document.
//!
//! For a set present on both sides the newer `updatedAt` wins outright. On a
//! tie the result is a field union with local values taking precedence.
//! Sets present on only one side are kept. Remote order is preserved, with
//! local-only sets appended in their local order.
//!
//! Timestamps are client-assigned and trusted as-is; a device with a skewed
//! clock can win or lose merges it should not.

use std::collections::{HashMap, HashSet};

use crate::document::{Document, PoseSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub document: Document,
    pub kept_local: usize,
    pub kept_remote: usize,
    /// Equal timestamps resolved by field union.
    pub unioned: usize,
    pub local_only: usize,
    pub remote_only: usize,
}

pub fn merge_documents(local: &Document, remote: &Document) -> Document {
    merge_with_report(local, remote).document
}

pub fn merge_with_report(local: &Document, remote: &Document) -> MergeReport {
    let local_by_id: HashMap<&str, &PoseSet> =
        local.sets.iter().map(|s| (s.id.as_str(), s)).collect();
    let remote_ids: HashSet<&str> = remote.sets.iter().map(|s| s.id.as_str()).collect();

    let mut report = MergeReport::default();
    let mut sets = Vec::with_capacity(local.sets.len().max(remote.sets.len()));

    for remote_set in &remote.sets {
        let Some(local_set) = local_by_id.get(remote_set.id.as_str()) else {
            report.remote_only += 1;
            sets.push(remote_set.clone());
            continue;
        };

        let local_ts = local_set.updated_at_or_epoch();
        let remote_ts = remote_set.updated_at_or_epoch();
        let merged = if local_ts == remote_ts {
            report.unioned += 1;
            union_prefer_local(local_set, remote_set)
        } else if local_ts > remote_ts {
            report.kept_local += 1;
            (*local_set).clone()
        } else {
            report.kept_remote += 1;
            remote_set.clone()
        };
        sets.push(merged);
    }

    for local_set in &local.sets {
        if !remote_ids.contains(local_set.id.as_str()) {
            report.local_only += 1;
            sets.push(local_set.clone());
        }
    }

    report.document = Document::new(sets);
    tracing::debug!(
        kept_local = report.kept_local,
        kept_remote = report.kept_remote,
        unioned = report.unioned,
        local_only = report.local_only,
        remote_only = report.remote_only,
        "merged documents"
    );
    report
}

/// Every field from `local`, plus domain fields only `remote` carries.
fn union_prefer_local(local: &PoseSet, remote: &PoseSet) -> PoseSet {
    let mut merged = local.clone();
    for (key, value) in &remote.extra {
        merged
            .extra
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }
    merged
}
