use thiserror::Error;

/// Errors that can occur when writing documents to object storage
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to upload object {key}: {message}")]
    Upload { key: String, message: String },

    #[error("Cannot build a public URL for {key}: {message}")]
    InvalidPublicUrl { key: String, message: String },
}
