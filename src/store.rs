//! Object-storage boundary: listing, reads, writes, and the change feed.
//!
//! The transport itself (S3-compatible client, local disk, in-process map) is
//! a collaborator behind the [`ObjectStore`] trait; the aggregation and sync
//! engines only ever see this interface.

use {
    crate::model::ObjectName,
    async_trait::async_trait,
    tokio::sync::mpsc,
};

/// Transport-level failure talking to the object store.
#[derive(Debug)]
pub enum StoreError {
    Transport(String),
    NotFound(String),
    Io(std::io::Error),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Transport(msg) => write!(f, "transport error: {}", msg),
            StoreError::NotFound(key) => write!(f, "object not found: {}", key),
            StoreError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

/// Kind of change reported by the bucket notification feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Removed,
}

/// One create/remove notification scoped to a bucket.
#[derive(Debug, Clone)]
pub struct ObjectEvent {
    pub kind: EventKind,
    pub object: ObjectName,
}

impl ObjectEvent {
    pub fn created(key: &str) -> Self {
        Self {
            kind: EventKind::Created,
            object: ObjectName::new(key),
        }
    }

    pub fn removed(key: &str) -> Self {
        Self {
            kind: EventKind::Removed,
            object: ObjectName::new(key),
        }
    }
}

/// Storage operations consumed by the pipeline.
///
/// The change feed is delivered as a bounded mpsc channel; a transport
/// failure on the feed closes the channel rather than injecting bogus
/// events. Delivery is at-least-once: consumers must tolerate duplicate and
/// re-ordered notifications.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List every object in the bucket. Listing order is whatever the
    /// backend returns and is not guaranteed stable across calls.
    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectName>, StoreError>;

    /// Read an object's full content.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Write an object's full content with a declared content type.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StoreError>;

    /// Subscribe to create/remove notifications for the bucket.
    async fn subscribe(&self, bucket: &str) -> Result<mpsc::Receiver<ObjectEvent>, StoreError>;
}
