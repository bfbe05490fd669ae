//! Object storage for uploaded inputs and generated results.

mod http;

pub use http::HttpObjectStore;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    #[error("object not found: {bucket}/{path}")]
    NotFound { bucket: String, path: String },
    #[error("storage request failed: {0}")]
    Transport(String),
    #[error("storage returned status {status}: {body}")]
    Status { status: u16, body: String },
}

/// A bucket of named binary objects.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Write `bytes` at `path`, replacing anything already there.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError>;
}

#[async_trait]
impl<S: ObjectStore + ?Sized> ObjectStore for Arc<S> {
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        (**self).get(path).await
    }

    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        (**self).put(path, bytes, content_type).await
    }
}

/// A stored object with its declared content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-memory bucket for tests/dev.
#[derive(Debug)]
pub struct InMemoryObjectStore {
    bucket: String,
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.objects.write().unwrap().insert(
            path.into(),
            StoredObject {
                bytes: bytes.into(),
                content_type: "text/csv".to_string(),
            },
        );
    }

    pub fn object(&self, path: &str) -> Option<StoredObject> {
        self.objects.read().unwrap().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.objects.read().unwrap().keys().cloned().collect();
        paths.sort();
        paths
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.objects
            .read()
            .unwrap()
            .get(path)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StorageError::NotFound {
                bucket: self.bucket.clone(),
                path: path.to_string(),
            })
    }

    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        self.objects.write().unwrap().insert(
            path.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}
