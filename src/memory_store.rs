//! In-process [`ObjectStore`] backend.
//!
//! Used by the integration tests and by local runs where no remote store is
//! wired up. Keys are held in a `BTreeMap` per bucket, so listing order is
//! lexicographic; real backends make no such promise.

use {
    crate::model::ObjectName,
    crate::store::{EventKind, ObjectEvent, ObjectStore, StoreError},
    async_trait::async_trait,
    std::collections::{BTreeMap, HashMap},
    std::sync::Mutex,
    tokio::sync::mpsc,
};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Default)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>,
    subscribers: Mutex<Vec<(String, mpsc::Sender<ObjectEvent>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delete an object and notify subscribers, mirroring a bucket removal
    /// event from a real store.
    pub async fn remove_object(&self, bucket: &str, key: &str) {
        let existed = {
            let mut buckets = self.buckets.lock().unwrap();
            buckets
                .get_mut(bucket)
                .map(|objects| objects.remove(key).is_some())
                .unwrap_or(false)
        };
        if existed {
            self.notify(bucket, ObjectEvent {
                kind: EventKind::Removed,
                object: ObjectName::new(key),
            })
            .await;
        }
    }

    async fn notify(&self, bucket: &str, event: ObjectEvent) {
        let targets: Vec<mpsc::Sender<ObjectEvent>> = {
            let subscribers = self.subscribers.lock().unwrap();
            subscribers
                .iter()
                .filter(|(b, _)| b == bucket)
                .map(|(_, tx)| tx.clone())
                .collect()
        };
        for tx in targets {
            // A dropped receiver just means that subscriber went away.
            let _ = tx.send(event.clone()).await;
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectName>, StoreError> {
        let buckets = self.buckets.lock().unwrap();
        Ok(buckets
            .get(bucket)
            .map(|objects| objects.keys().map(|k| ObjectName::new(k)).collect())
            .unwrap_or_default())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError> {
        let buckets = self.buckets.lock().unwrap();
        buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{}/{}", bucket, key)))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StoreError> {
        {
            let mut buckets = self.buckets.lock().unwrap();
            buckets
                .entry(bucket.to_string())
                .or_default()
                .insert(key.to_string(), body);
        }
        self.notify(bucket, ObjectEvent {
            kind: EventKind::Created,
            object: ObjectName::new(key),
        })
        .await;
        Ok(())
    }

    async fn subscribe(&self, bucket: &str) -> Result<mpsc::Receiver<ObjectEvent>, StoreError> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.subscribers
            .lock()
            .unwrap()
            .push((bucket.to_string(), tx));
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_list_roundtrip() {
        let store = MemoryStore::new();
        store
            .put_object("datalake", "alice.csv", b"hi".to_vec(), "application/csv")
            .await
            .unwrap();

        let body = store.get_object("datalake", "alice.csv").await.unwrap();
        assert_eq!(body, b"hi");

        let listing = store.list_objects("datalake").await.unwrap();
        assert_eq!(listing.len(), 1);
        assert_eq!(listing[0].stem, "alice");
    }

    #[tokio::test]
    async fn missing_object_is_not_found() {
        let store = MemoryStore::new();
        let err = store.get_object("datalake", "nope.csv").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn subscribers_see_creates_and_removes() {
        let store = MemoryStore::new();
        let mut events = store.subscribe("datalake").await.unwrap();

        store
            .put_object("datalake", "bob.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        store.remove_object("datalake", "bob.png").await;

        let created = events.recv().await.unwrap();
        assert_eq!(created.kind, EventKind::Created);
        assert_eq!(created.object.stem, "bob");

        let removed = events.recv().await.unwrap();
        assert_eq!(removed.kind, EventKind::Removed);
        assert!(removed.object.is_image());
    }

    #[tokio::test]
    async fn events_are_scoped_to_bucket() {
        let store = MemoryStore::new();
        let mut events = store.subscribe("datalake").await.unwrap();

        store
            .put_object("other", "x.csv", vec![], "application/csv")
            .await
            .unwrap();
        store
            .put_object("datalake", "y.csv", vec![], "application/csv")
            .await
            .unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.object.key, "y.csv");
    }
}
