//! DocumentCache tests.

use std::sync::Arc;

use pose_sync::cache::{DocumentCache, KeyValueStore, MemoryKeyValueStore, ReadOptions};
use pose_sync::clock::ManualClock;
use pose_sync::config::SyncConfig;
use pose_sync::document::{Document, DocumentSnapshot, PoseSet};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

fn snapshot(name: &str) -> DocumentSnapshot {
    DocumentSnapshot {
        document: Document::new(vec![PoseSet::new("a", name).with_updated_at(1)]),
        remote_id: Some("blob-1".into()),
        fingerprint: Some("abc".into()),
        last_modified: None,
    }
}

fn cache_over(kv: Arc<MemoryKeyValueStore>) -> (DocumentCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(10_000));
    let cache = DocumentCache::new(kv, &SyncConfig::default(), clock.clone());
    (cache, clock)
}

#[test]
fn fresh_read_returns_written_snapshot() {
    let (cache, _clock) = cache_over(Arc::new(MemoryKeyValueStore::new()));
    assert_eq!(cache.key(), "pose-sync:doc:v1");
    assert!(cache.read(ReadOptions::fresh()).is_none());

    assert!(cache.write(&snapshot("A")));
    assert_eq!(cache.read(ReadOptions::fresh()), Some(snapshot("A")));
}

#[test]
fn expired_snapshot_needs_allow_stale() {
    let (cache, clock) = cache_over(Arc::new(MemoryKeyValueStore::new()));
    cache.write(&snapshot("A"));

    clock.advance(DAY_MS - 1);
    assert!(cache.read(ReadOptions::fresh()).is_some());

    clock.advance(1);
    assert!(cache.read(ReadOptions::fresh()).is_none());
    assert_eq!(cache.read(ReadOptions::allow_stale()), Some(snapshot("A")));
}

#[test]
fn unreadable_entry_is_dropped() {
    let kv = Arc::new(MemoryKeyValueStore::new());
    let (cache, _clock) = cache_over(kv.clone());
    kv.set(cache.key(), "{definitely not a snapshot").unwrap();

    assert!(cache.read(ReadOptions::allow_stale()).is_none());
    assert_eq!(kv.get(cache.key()).unwrap(), None);
}

#[test]
fn quota_evicts_other_keys_but_keeps_dirty_flag() {
    let kv = Arc::new(MemoryKeyValueStore::with_quota(600));
    kv.set("pose-sync:dirty", "1").unwrap();
    kv.set("other-app:blob", &"x".repeat(300)).unwrap();
    let (cache, _clock) = cache_over(kv.clone());

    assert!(cache.write(&snapshot(&"n".repeat(250))));

    assert_eq!(kv.get("other-app:blob").unwrap(), None);
    assert_eq!(kv.get("pose-sync:dirty").unwrap().as_deref(), Some("1"));
    assert!(cache.read(ReadOptions::fresh()).is_some());
}

#[test]
fn write_reports_false_when_snapshot_never_fits() {
    let kv = Arc::new(MemoryKeyValueStore::with_quota(64));
    let (cache, _clock) = cache_over(kv);

    assert!(!cache.write(&snapshot(&"n".repeat(200))));
    assert!(cache.read(ReadOptions::allow_stale()).is_none());
}

#[test]
fn clear_removes_snapshot() {
    let (cache, _clock) = cache_over(Arc::new(MemoryKeyValueStore::new()));
    cache.write(&snapshot("A"));
    cache.clear();
    assert!(cache.read(ReadOptions::allow_stale()).is_none());
}
