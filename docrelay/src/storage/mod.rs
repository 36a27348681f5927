//! Object storage for uploaded documents.
//!
//! Documents are written under `uploads/{uuid}-{filename}` and handed to the document service
//! by public URL. The bucket must grant public read access through its own policy; nothing here
//! checks that a stored object is actually reachable.

mod error;
#[cfg(test)]
pub mod in_memory;
mod s3;

pub use error::StorageError;
pub use s3::S3Store;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

/// Prefix shared by every uploaded object.
pub const UPLOAD_PREFIX: &str = "uploads";

/// Storage backend for uploaded documents.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Start writing an object under `key`, replacing anything already there once finished.
    async fn begin_upload(&self, key: &str, content_type: Option<&str>) -> Result<Box<dyn ObjectUpload>, StorageError>;

    /// The URL under which `key` is readable without credentials.
    fn public_url(&self, key: &str) -> Result<Url, StorageError>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for Arc<T> {
    async fn begin_upload(&self, key: &str, content_type: Option<&str>) -> Result<Box<dyn ObjectUpload>, StorageError> {
        (**self).begin_upload(key, content_type).await
    }

    fn public_url(&self, key: &str) -> Result<Url, StorageError> {
        (**self).public_url(key)
    }
}

/// An object being written chunk by chunk.
///
/// Nothing is visible under the key until [`finish`](ObjectUpload::finish) succeeds. After a failed
/// `write` or `finish`, callers should [`abort`](ObjectUpload::abort) to release partial state.
#[async_trait]
pub trait ObjectUpload: Send {
    async fn write(&mut self, chunk: Bytes) -> Result<(), StorageError>;

    async fn finish(&mut self) -> Result<(), StorageError>;

    async fn abort(&mut self);
}

/// The last path component of a client-supplied filename, or `None` if nothing usable remains.
///
/// Browsers and tools may send `dir/name.pdf` or `C:\dir\name.pdf`; only `name.pdf` is kept so the
/// object key never gains extra path segments.
pub fn file_name_component(name: &str) -> Option<&str> {
    name.rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|component| !component.is_empty() && *component != "." && *component != "..")
}

/// Build a collision-free object key for an uploaded file.
pub fn object_key(filename: &str) -> String {
    format!("{UPLOAD_PREFIX}/{}-{filename}", Uuid::new_v4())
}

/// Derive the public URL of `key`.
///
/// Without a `base`, the virtual-hosted AWS form `https://{bucket}.s3.{region}.amazonaws.com/{key}`
/// is used. Key segments are percent-encoded; the key itself is not changed.
pub fn public_object_url(bucket: &str, region: &str, base: Option<&Url>, key: &str) -> Result<Url, StorageError> {
    let mut url = match base {
        Some(base) => base.clone(),
        None => {
            let host = format!("https://{bucket}.s3.{region}.amazonaws.com/");
            Url::parse(&host).map_err(|e| StorageError::InvalidPublicUrl {
                key: key.to_string(),
                message: format!("{host}: {e}"),
            })?
        }
    };

    {
        let mut segments = url.path_segments_mut().map_err(|_| StorageError::InvalidPublicUrl {
            key: key.to_string(),
            message: format!("{base:?} cannot be used as a base URL"),
        })?;
        segments.pop_if_empty().extend(key.split('/'));
    }

    Ok(url)
}
