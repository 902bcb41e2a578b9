//! Asset store persistence tests
//!
//! Exercise the store against the directory backend: reload survival,
//! age eviction across reopen, namespace separation.

use chrono::{Duration, Utc};
use mediaref_store::{
    AssetStore, AssetToken, Clock, FileBackend, ManualClock, MediaKind, StoreConfig, StoredAsset,
};
use proptest::prelude::*;
use std::sync::Arc;

async fn open(dir: &std::path::Path, kind: MediaKind, clock: Arc<ManualClock>) -> AssetStore {
    AssetStore::open(
        Arc::new(FileBackend::new(dir)),
        kind,
        StoreConfig::for_kind(kind),
        clock,
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn survives_reopen_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(Utc::now()));

    let token = AssetToken::mint(MediaKind::Image);
    {
        let store = open(dir.path(), MediaKind::Image, clock.clone()).await;
        store
            .put(
                StoredAsset::new(token.clone(), "data:image/png;base64,iVBORw0KGgo=", clock.now())
                    .with_description("a lighthouse at dusk")
                    .with_thumbnail(Some("https://cdn.example/preview.jpg".into())),
            )
            .await
            .unwrap();
    }

    let store = open(dir.path(), MediaKind::Image, clock).await;
    let asset = store.get(&token).unwrap();
    assert_eq!(asset.description, "a lighthouse at dusk");
    assert_eq!(asset.thumbnail.as_deref(), Some("https://cdn.example/preview.jpg"));
}

#[tokio::test]
async fn stale_entries_dropped_on_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(Utc::now()));

    let token = AssetToken::mint(MediaKind::Image);
    {
        let store = open(dir.path(), MediaKind::Image, clock.clone()).await;
        store
            .put(StoredAsset::new(token.clone(), "payload", clock.now()))
            .await
            .unwrap();
    }

    clock.advance(Duration::hours(2));
    let store = open(dir.path(), MediaKind::Image, clock).await;
    assert!(store.is_empty());
    assert!(store.get(&token).is_none());
}

#[tokio::test]
async fn videos_outlive_images() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(Utc::now()));

    let images = open(dir.path(), MediaKind::Image, clock.clone()).await;
    let videos = open(dir.path(), MediaKind::Video, clock.clone()).await;

    let img = AssetToken::mint(MediaKind::Image);
    let vid = AssetToken::mint(MediaKind::Video);
    images
        .put(StoredAsset::new(img.clone(), "image-bytes", clock.now()))
        .await
        .unwrap();
    videos
        .put(StoredAsset::new(vid.clone(), "video-bytes", clock.now()))
        .await
        .unwrap();

    assert!(dir.path().join("images.json").exists());
    assert!(dir.path().join("videos.json").exists());

    clock.advance(Duration::hours(3));
    assert!(!images.contains(&img));
    assert!(videos.contains(&vid));
}

#[tokio::test]
async fn concurrent_writers_share_one_store() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let store = Arc::new(
        AssetStore::open(
            Arc::new(mediaref_store::MemoryBackend::new()),
            MediaKind::Image,
            StoreConfig::for_kind(MediaKind::Image).with_soft_cap(64 * 1024),
            clock.clone(),
        )
        .await
        .unwrap(),
    );

    let mut handles = Vec::new();
    for worker in 0..4 {
        let store = store.clone();
        let clock = clock.clone();
        handles.push(tokio::spawn(async move {
            let mut tokens = Vec::new();
            for i in 0..10 {
                let token = AssetToken::mint(MediaKind::Image);
                store
                    .put(StoredAsset::new(
                        token.clone(),
                        format!("payload-{worker}-{i}"),
                        clock.now(),
                    ))
                    .await
                    .unwrap();
                tokens.push(token);
            }
            tokens
        }));
    }

    for handle in handles {
        for token in handle.await.unwrap() {
            assert!(store.contains(&token));
        }
    }
    assert_eq!(store.len(), 40);
}

proptest! {
    #[test]
    fn prop_serialized_size_never_exceeds_cap_after_put(
        sizes in proptest::collection::vec(10usize..300, 1..20)
    ) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let clock = Arc::new(ManualClock::new(Utc::now()));
            let cap = 2_000;
            let store = AssetStore::open(
                Arc::new(mediaref_store::MemoryBackend::new()),
                MediaKind::Image,
                StoreConfig::for_kind(MediaKind::Image).with_soft_cap(cap),
                clock.clone(),
            )
            .await
            .unwrap();

            for size in sizes {
                store
                    .put(StoredAsset::new(AssetToken::mint(MediaKind::Image), "p".repeat(size), clock.now()))
                    .await
                    .unwrap();
                clock.advance(Duration::milliseconds(10));
                // A single entry always fits under this cap
                assert!(store.serialized_size() <= cap);
            }
        });
    }
}
