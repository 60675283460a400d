//! ImageIndexStore tests, including the v1 to v2 upgrade.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use pose_sync::config::SyncConfig;
use pose_sync::error::StoreError;
use pose_sync::image_index::{ImageIndex, ImageItem};
use pose_sync::store::{ImageIndexSource, ImageIndexStore, MemoryBlobStore};

fn setup() -> (Arc<MemoryBlobStore>, ImageIndexStore) {
    let blobs = Arc::new(MemoryBlobStore::new());
    let store = ImageIndexStore::from_config(blobs.clone(), &SyncConfig::default());
    (blobs, store)
}

#[tokio::test]
async fn published_index_reads_back() {
    let (blobs, store) = setup();
    let mut item = ImageItem::new("img-1", "one.jpg");
    item.mime_type = Some("image/jpeg".into());
    item.width = Some(800);
    let index = ImageIndex::new(
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        vec![item, ImageItem::new("img-2", "two.png")],
    );

    store.publish("set-1", &index).await.unwrap();
    assert!(blobs.body_of("set-1.images.json").is_some());

    let fetched = store.fetch_index("set-1").await.unwrap().unwrap();
    assert_eq!(fetched, index);
}

#[tokio::test]
async fn republishing_overwrites_in_place() {
    let (blobs, store) = setup();
    let index = ImageIndex::new(Utc::now(), vec![ImageItem::new("a", "a")]);
    let first = store.publish("set-1", &index).await.unwrap();
    let second = store.publish("set-1", &index).await.unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(blobs.len(), 1);
}

#[tokio::test]
async fn v1_listing_upgrades_with_epoch_timestamp() {
    let (blobs, store) = setup();
    blobs.put_raw(
        "set-1.images.json",
        br#"{"version": 1, "items": [{"id": "a", "name": "a.jpg"}, {"id": "b"}]}"#.to_vec(),
    );

    let index = store.fetch_index("set-1").await.unwrap().unwrap();
    assert_eq!(index.updated_at, DateTime::<Utc>::default());
    assert_eq!(index.count(), 2);
    assert_eq!(index.items[0], ImageItem::new("a", "a.jpg"));
    assert_eq!(index.items[1].name, "");
}

#[tokio::test]
async fn missing_index_is_none() {
    let (_blobs, store) = setup();
    assert!(store.fetch_index("set-1").await.unwrap().is_none());
}

#[tokio::test]
async fn garbage_index_is_corrupt() {
    let (blobs, store) = setup();
    blobs.put_raw("set-1.images.json", b"<html>".to_vec());
    let err = store.fetch_index("set-1").await.unwrap_err();
    assert!(matches!(err, StoreError::Corrupt { .. }));
}
