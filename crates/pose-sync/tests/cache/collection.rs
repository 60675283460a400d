//! CollectionCache tests: memory fast path, durable fallthrough, lazy TTL
//! purge and quota eviction.

use std::sync::Arc;

use pose_sync::cache::{CollectionCache, MemoryCollectionStore, ReadOptions};
use pose_sync::clock::ManualClock;
use pose_sync::config::SyncConfig;
use pose_sync::image_index::ImageItem;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

fn items(prefix: &str, n: usize) -> Vec<ImageItem> {
    (0..n)
        .map(|i| ImageItem::new(format!("{prefix}-{i}"), format!("{prefix} {i}.jpg")))
        .collect()
}

fn setup(durable: Arc<MemoryCollectionStore>) -> (CollectionCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_000));
    let cache = CollectionCache::new(durable, &SyncConfig::default(), clock.clone());
    (cache, clock)
}

#[tokio::test]
async fn memory_hit_skips_durable_store() {
    let durable = Arc::new(MemoryCollectionStore::new());
    let (cache, _clock) = setup(durable.clone());

    assert!(cache.write("set-1", items("img", 3)).await);
    let entry = cache.read("set-1", ReadOptions::fresh()).await.unwrap();

    assert_eq!(entry.items.len(), 3);
    assert_eq!(entry.owner_id, "set-1");
    assert_eq!(durable.get_calls(), 0);
    assert!(durable.contains("pose-sync:images:v2:set-1"));
}

#[tokio::test]
async fn cold_memory_falls_through_and_repopulates() {
    let durable = Arc::new(MemoryCollectionStore::new());
    let (cache, _clock) = setup(durable.clone());
    cache.write("set-1", items("img", 2)).await;
    cache.clear_memory();

    let first = cache.read("set-1", ReadOptions::fresh()).await.unwrap();
    let second = cache.read("set-1", ReadOptions::fresh()).await.unwrap();

    assert_eq!(first.items, second.items);
    assert_eq!(durable.get_calls(), 1);
}

#[tokio::test]
async fn miss_returns_none() {
    let durable = Arc::new(MemoryCollectionStore::new());
    let (cache, _clock) = setup(durable.clone());
    assert!(cache.read("nobody", ReadOptions::fresh()).await.is_none());
    assert_eq!(durable.get_calls(), 1);
}

#[tokio::test]
async fn expired_entry_is_purged_on_read() {
    let durable = Arc::new(MemoryCollectionStore::new());
    let (cache, clock) = setup(durable.clone());
    cache.write("set-1", items("img", 2)).await;

    clock.advance(DAY_MS);
    assert!(cache.read("set-1", ReadOptions::fresh()).await.is_none());
    assert!(!durable.contains("pose-sync:images:v2:set-1"));
    assert!(cache.read("set-1", ReadOptions::allow_stale()).await.is_none());
}

#[tokio::test]
async fn expired_durable_entry_is_purged_on_read() {
    let durable = Arc::new(MemoryCollectionStore::new());
    let (cache, clock) = setup(durable.clone());
    cache.write("set-1", items("img", 2)).await;
    cache.clear_memory();

    clock.advance(DAY_MS + 1);
    let stale = cache.read("set-1", ReadOptions::allow_stale()).await;
    assert!(stale.is_some());

    cache.clear_memory();
    assert!(cache.read("set-1", ReadOptions::fresh()).await.is_none());
    assert!(durable.is_empty());
}

#[tokio::test]
async fn quota_evicts_oldest_entries_first() {
    let durable = Arc::new(MemoryCollectionStore::with_max_items(10));
    let (cache, clock) = setup(durable.clone());

    for owner in ["old", "mid", "new"] {
        assert!(cache.write(owner, items(owner, 3)).await);
        clock.advance(1_000);
    }
    assert!(cache.write("incoming", items("incoming", 3)).await);

    assert!(!durable.contains("pose-sync:images:v2:old"));
    assert!(durable.contains("pose-sync:images:v2:mid"));
    assert!(durable.contains("pose-sync:images:v2:new"));
    assert!(durable.contains("pose-sync:images:v2:incoming"));

    // Evicted owners are gone from the memory layer as well.
    assert!(cache.read("old", ReadOptions::fresh()).await.is_none());
    assert!(cache.read("mid", ReadOptions::fresh()).await.is_some());
}

#[tokio::test]
async fn oversized_listing_is_still_served_from_memory() {
    let durable = Arc::new(MemoryCollectionStore::with_max_items(2));
    let (cache, _clock) = setup(durable.clone());

    assert!(!cache.write("big", items("big", 5)).await);
    assert!(durable.is_empty());
    let entry = cache.read("big", ReadOptions::fresh()).await.unwrap();
    assert_eq!(entry.items.len(), 5);
}

#[tokio::test]
async fn invalidate_clears_both_layers() {
    let durable = Arc::new(MemoryCollectionStore::new());
    let (cache, _clock) = setup(durable.clone());
    cache.write("set-1", items("img", 1)).await;

    cache.invalidate("set-1").await;
    assert!(durable.is_empty());
    assert!(cache.read("set-1", ReadOptions::allow_stale()).await.is_none());
}
