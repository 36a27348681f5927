//! In-memory [`ObjectStore`] for tests.

use super::{ObjectStore, ObjectUpload, StorageError, public_object_url};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::Mutex;
use url::Url;

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
}

type Objects = Arc<Mutex<HashMap<String, StoredObject>>>;

/// Keeps uploaded objects in a map and can be told to fail every upload.
#[derive(Clone)]
pub struct InMemoryStore {
    bucket: String,
    region: String,
    objects: Objects,
    fail_uploads: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new(bucket: &str, region: &str) -> Self {
        Self {
            bucket: bucket.to_string(),
            region: region.to_string(),
            objects: Arc::new(Mutex::new(HashMap::new())),
            fail_uploads: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make every subsequent upload fail the way an unreachable bucket would.
    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    pub async fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.lock().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.lock().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

struct InMemoryUpload {
    objects: Objects,
    key: String,
    content_type: Option<String>,
    buffer: BytesMut,
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn begin_upload(&self, key: &str, content_type: Option<&str>) -> Result<Box<dyn ObjectUpload>, StorageError> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(StorageError::Upload {
                key: key.to_string(),
                message: format!("bucket {} is unreachable", self.bucket),
            });
        }

        Ok(Box::new(InMemoryUpload {
            objects: self.objects.clone(),
            key: key.to_string(),
            content_type: content_type.map(str::to_string),
            buffer: BytesMut::new(),
        }))
    }

    fn public_url(&self, key: &str) -> Result<Url, StorageError> {
        public_object_url(&self.bucket, &self.region, None, key)
    }
}

#[async_trait]
impl ObjectUpload for InMemoryUpload {
    async fn write(&mut self, chunk: Bytes) -> Result<(), StorageError> {
        self.buffer.extend_from_slice(&chunk);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), StorageError> {
        let object = StoredObject {
            body: self.buffer.split().freeze(),
            content_type: self.content_type.clone(),
        };
        self.objects.lock().await.insert(self.key.clone(), object);
        Ok(())
    }

    async fn abort(&mut self) {
        self.buffer.clear();
    }
}
