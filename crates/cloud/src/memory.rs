//! In-process implementations of [`ObjectStore`] and [`Publisher`].
//!
//! Used by tests and local runs. Both keep everything behind a `RwLock`, so a
//! single instance can be shared through an `Arc` by several stages.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::{ObjectLocation, ObjectStore, PublishError, Publisher, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<HashMap<ObjectLocation, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without going through the async API.
    pub fn insert(
        &self,
        location: ObjectLocation,
        data: impl Into<Bytes>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.objects
            .write()
            .map_err(|_| StorageError::backend("poisoned lock"))?
            .insert(
                location,
                StoredObject {
                    data: data.into(),
                    content_type: content_type.to_string(),
                },
            );
        Ok(())
    }

    pub fn get(&self, location: &ObjectLocation) -> Option<StoredObject> {
        self.objects
            .read()
            .ok()
            .and_then(|objects| objects.get(location).cloned())
    }

    /// Every location stored under `bucket`, sorted.
    pub fn list(&self, bucket: &str) -> Vec<ObjectLocation> {
        let mut found: Vec<ObjectLocation> = self
            .objects
            .read()
            .map(|objects| {
                objects
                    .keys()
                    .filter(|loc| loc.bucket == bucket)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by(|a, b| a.path.cmp(&b.path));
        found
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn read(&self, location: &ObjectLocation) -> Result<Bytes, StorageError> {
        self.objects
            .read()
            .map_err(|_| StorageError::backend("poisoned lock"))?
            .get(location)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| StorageError::NotFound(location.uri()))
    }

    async fn write(
        &self,
        location: &ObjectLocation,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.insert(location.clone(), data, content_type)
    }

    async fn copy(
        &self,
        source: &ObjectLocation,
        destination: &ObjectLocation,
    ) -> Result<ObjectLocation, StorageError> {
        let mut objects = self
            .objects
            .write()
            .map_err(|_| StorageError::backend("poisoned lock"))?;
        let object = objects
            .get(source)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(source.uri()))?;
        objects.insert(destination.clone(), object);
        Ok(destination.clone())
    }
}

/// A message captured by [`InMemoryPublisher`].
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedMessage {
    pub topic: String,
    pub message_id: String,
    pub payload: Value,
}

#[derive(Default)]
pub struct InMemoryPublisher {
    published: RwLock<Vec<PublishedMessage>>,
    next_id: AtomicU64,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published
            .read()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    pub fn published_to(&self, topic: &str) -> Vec<Value> {
        self.published()
            .into_iter()
            .filter(|m| m.topic == topic)
            .map(|m| m.payload)
            .collect()
    }
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(&self, topic: &str, message: &Value) -> Result<String, PublishError> {
        let message_id = (self.next_id.fetch_add(1, Ordering::Relaxed) + 1).to_string();
        self.published
            .write()
            .map_err(|_| PublishError::backend("poisoned lock"))?
            .push(PublishedMessage {
                topic: topic.to_string(),
                message_id: message_id.clone(),
                payload: message.clone(),
            });
        Ok(message_id)
    }
}
