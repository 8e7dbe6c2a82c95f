//! Durable object storage for ingested recordings.

mod local;

pub use local::LocalObjectStorage;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// An object read back from storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Key/value object store. `put` overwrites any existing object at `key`.
#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, body: &[u8], content_type: &str) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Option<StoredObject>, StorageError>;

    /// A URL-like locator for `key`, suitable for display.
    fn locator(&self, key: &str) -> String;
}
