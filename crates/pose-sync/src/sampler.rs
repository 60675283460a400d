//! Non-repeating batch sampling over per-set collections.
//!
//! Each `(set, view)` context keeps a seen set so successive "load more"
//! requests do not repeat items until the whole pool has been handed out.
//! Seen sets are memory-only and reset automatically when the pool they
//! were built against changes.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use parking_lot::Mutex;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::document::PoseSet;
use crate::image_index::ImageItem;

/// Anything with a stable string id.
pub trait Identified {
    fn item_id(&self) -> &str;
}

impl Identified for ImageItem {
    fn item_id(&self) -> &str {
        &self.id
    }
}

impl Identified for PoseSet {
    fn item_id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ViewKind {
    All,
    Favorites,
    Custom(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SamplerContext {
    pub entity_id: String,
    pub view: ViewKind,
}

impl SamplerContext {
    pub fn new(entity_id: impl Into<String>, view: ViewKind) -> Self {
        Self {
            entity_id: entity_id.into(),
            view,
        }
    }
}

struct SeenState {
    pool_digest: u64,
    ids: HashSet<String>,
}

#[derive(Default)]
pub struct BatchSampler {
    seen: Mutex<HashMap<SamplerContext, SeenState>>,
}

impl BatchSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw up to `count` unseen items from `pool` in random order.
    ///
    /// When the pass runs out mid-batch the seen set resets and the
    /// shortfall is drawn from a fresh pass, so a request for
    /// `count <= pool.len()` items always returns exactly `count` distinct
    /// items.
    pub fn pick_next<T: Identified + Clone>(
        &self,
        ctx: &SamplerContext,
        pool: &[T],
        count: usize,
    ) -> Vec<T> {
        self.pick_next_with(ctx, pool, count, &mut rand::thread_rng())
    }

    pub fn pick_next_with<T, R>(
        &self,
        ctx: &SamplerContext,
        pool: &[T],
        count: usize,
        rng: &mut R,
    ) -> Vec<T>
    where
        T: Identified + Clone,
        R: Rng + ?Sized,
    {
        let pool = dedupe(pool);
        if pool.is_empty() || count == 0 {
            return Vec::new();
        }

        let digest = pool_digest(&pool);
        let mut seen = self.seen.lock();
        let state = seen.entry(ctx.clone()).or_insert_with(|| SeenState {
            pool_digest: digest,
            ids: HashSet::new(),
        });
        if state.pool_digest != digest {
            tracing::debug!(entity_id = %ctx.entity_id, "pool changed, resetting seen set");
            state.pool_digest = digest;
            state.ids.clear();
        }

        let mut remaining: Vec<&T> = pool
            .iter()
            .copied()
            .filter(|item| !state.ids.contains(item.item_id()))
            .collect();
        if remaining.is_empty() {
            state.ids.clear();
            remaining = pool.clone();
        }

        let take = count.min(remaining.len());
        let mut picked: Vec<&T> = remaining.choose_multiple(rng, take).copied().collect();

        if picked.len() < count && picked.len() < pool.len() {
            state.ids.clear();
            let picked_ids: HashSet<&str> = picked.iter().map(|item| item.item_id()).collect();
            let refill: Vec<&T> = pool
                .iter()
                .copied()
                .filter(|item| !picked_ids.contains(item.item_id()))
                .collect();
            let extra = (count - picked.len()).min(refill.len());
            picked.extend(refill.choose_multiple(rng, extra).copied());
        }

        for item in &picked {
            state.ids.insert(item.item_id().to_string());
        }
        picked.shuffle(rng);
        picked.into_iter().cloned().collect()
    }

    /// Number of items already handed out in the current pass.
    pub fn seen_count(&self, ctx: &SamplerContext) -> usize {
        self.seen.lock().get(ctx).map_or(0, |s| s.ids.len())
    }

    pub fn reset(&self, ctx: &SamplerContext) {
        self.seen.lock().remove(ctx);
    }

    /// Forget every view of one set, e.g. after its index was rebuilt.
    pub fn reset_entity(&self, entity_id: &str) {
        self.seen.lock().retain(|ctx, _| ctx.entity_id != entity_id);
    }

    pub fn clear(&self) {
        self.seen.lock().clear();
    }
}

/// Keep `existing` as-is and append each `incoming` item whose id is new.
/// Duplicate ids already inside `existing` collapse to their first
/// occurrence.
pub fn append_unique<T: Identified + Clone>(existing: &[T], incoming: &[T]) -> Vec<T> {
    let mut ids: HashSet<&str> = HashSet::with_capacity(existing.len() + incoming.len());
    let mut out = Vec::with_capacity(existing.len() + incoming.len());
    for item in existing.iter().chain(incoming) {
        if ids.insert(item.item_id()) {
            out.push(item.clone());
        }
    }
    out
}

fn dedupe<T: Identified>(pool: &[T]) -> Vec<&T> {
    let mut ids = HashSet::with_capacity(pool.len());
    pool.iter().filter(|item| ids.insert(item.item_id())).collect()
}

fn pool_digest<T: Identified>(pool: &[&T]) -> u64 {
    let mut hasher = DefaultHasher::new();
    pool.len().hash(&mut hasher);
    for item in pool {
        item.item_id().hash(&mut hasher);
    }
    hasher.finish()
}
