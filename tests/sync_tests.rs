//! End-to-end tests: real listener, HTTP client and sync cache

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;

use zarvault::{
    api::{router, ApiState},
    ClientConfig, EntryStore, GalleryClient, HttpBlobSink, PipelineConfig, SharedStore, StoreError,
    SyncCache, SyncConfig, UploadPipeline, UploadRequest,
};

async fn spawn_server(store: SharedStore) -> SocketAddr {
    let state = Arc::new(ApiState::new(store, None, PipelineConfig::default()));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    addr
}

fn client_for(addr: SocketAddr) -> GalleryClient {
    GalleryClient::new(ClientConfig::new(format!("http://{addr}"))).unwrap()
}

fn fast_sync() -> SyncConfig {
    SyncConfig {
        interval: Duration::from_millis(100),
        poll_timeout: Duration::from_secs(2),
    }
}

#[tokio::test]
async fn test_post_then_get_lists_new_entry_first() {
    let store = SharedStore::new(EntryStore::open_in_memory().unwrap());
    let addr = spawn_server(store).await;
    let client = client_for(addr);

    client.create_entry("https://x/first.jpg", None).await.unwrap();
    let created = client.create_entry("https://x/y.jpg", Some("hi")).await.unwrap();

    assert_eq!(created.image_ref, "https://x/y.jpg");
    assert_eq!(created.caption.as_deref(), Some("hi"));

    let entries = client.list_entries().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0], created);
}

#[tokio::test]
async fn test_client_maps_bad_request_to_validation() {
    let store = SharedStore::new(EntryStore::open_in_memory().unwrap());
    let addr = spawn_server(store).await;

    let err = client_for(addr).create_entry("  ", None).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_sync_cache_picks_up_new_entries() {
    let store = SharedStore::new(EntryStore::open_in_memory().unwrap());
    let addr = spawn_server(store.clone()).await;

    let mut cache = SyncCache::activate(client_for(addr), fast_sync());
    let mut reader = cache.subscribe();
    assert!(reader.is_loading());

    let first = timeout(Duration::from_secs(5), reader.changed())
        .await
        .unwrap()
        .unwrap();
    assert!(!first.loading);
    assert!(first.is_empty());

    store.append("https://x/new.jpg", Some("fresh")).await.unwrap();

    let second = timeout(Duration::from_secs(5), reader.changed())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second.entries[0].image_ref, "https://x/new.jpg");

    cache.deactivate().await;
    assert!(cache.stats().successes >= 2);
}

#[tokio::test]
async fn test_sync_cache_survives_unreachable_server() {
    // Grab a free port, then close it so nothing is listening.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };

    let cache = SyncCache::activate(client_for(addr), fast_sync());
    tokio::time::sleep(Duration::from_millis(350)).await;

    let snapshot = cache.current();
    assert!(snapshot.loading);
    assert!(snapshot.is_empty());
    assert!(cache.stats().failures >= 1);
    assert_eq!(cache.stats().successes, 0);
}

#[tokio::test]
async fn test_pipeline_commits_through_client() {
    let store = SharedStore::new(EntryStore::open_in_memory().unwrap());
    let addr = spawn_server(store.clone()).await;
    let pipeline = Arc::new(UploadPipeline::<HttpBlobSink, _>::new(
        None,
        client_for(addr),
        PipelineConfig::default(),
    ));

    let request = UploadRequest::from_operator_input("https://img.example/remote.jpg", Some(" remote ".into()))
        .await
        .unwrap();
    let entry = pipeline.submit(request).await.unwrap().unwrap();

    assert_eq!(entry.caption.as_deref(), Some("remote"));
    assert_eq!(store.list().await.unwrap()[0], entry);
}
