use std::sync::Arc;

use bytes::Bytes;
use cloud::{
    InMemoryObjectStore, InMemoryPublisher, ObjectLocation, ObjectStore, Publisher, StorageError,
};
use serde_json::json;

#[tokio::test]
async fn write_then_read_round_trips_content_type() {
    let store = InMemoryObjectStore::new();
    let loc = ObjectLocation::new("failed", "a.tif.error.json");

    store
        .write(&loc, Bytes::from_static(b"{}"), "application/json")
        .await
        .unwrap();

    assert_eq!(store.read(&loc).await.unwrap(), Bytes::from_static(b"{}"));
    assert_eq!(store.get(&loc).unwrap().content_type, "application/json");
}

#[tokio::test]
async fn copy_duplicates_and_keeps_source() {
    let store = InMemoryObjectStore::new();
    let src = ObjectLocation::new("in", "2024/a.tif");
    store.insert(src.clone(), b"tiff".to_vec(), "image/tiff").unwrap();

    let dst = src.in_bucket("archive");
    let copied = store.copy(&src, &dst).await.unwrap();

    assert_eq!(copied.uri(), "gs://archive/2024/a.tif");
    assert_eq!(store.read(&src).await.unwrap(), store.read(&dst).await.unwrap());
    assert_eq!(store.list("archive"), vec![dst]);
}

#[tokio::test]
async fn missing_objects_are_not_found() {
    let store = InMemoryObjectStore::new();
    let loc = ObjectLocation::new("in", "nope.png");

    assert!(matches!(store.read(&loc).await, Err(StorageError::NotFound(_))));
    assert!(matches!(
        store.copy(&loc, &loc.in_bucket("x")).await,
        Err(StorageError::NotFound(_))
    ));
}

#[tokio::test]
async fn publisher_records_messages_in_order_with_distinct_ids() {
    let publisher = Arc::new(InMemoryPublisher::new());

    let first = publisher.publish("classified", &json!({"n": 1})).await.unwrap();
    let second = publisher.publish("extracted", &json!({"n": 2})).await.unwrap();

    assert_ne!(first, second);
    let all = publisher.published();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].topic, "classified");
    assert_eq!(publisher.published_to("extracted"), vec![json!({"n": 2})]);
}
