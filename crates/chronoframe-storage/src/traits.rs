//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chronoframe_core::models::{StorageKey, StorageObjectMeta};
use chronoframe_core::AppError;
use futures::stream::BoxStream;
use futures::Stream;
use std::pin::Pin;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object not found: {}", key)),
            StorageError::InvalidKey(msg) => AppError::InvalidKey(msg),
            StorageError::UploadFailed(msg) => AppError::UploadFailed(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Object content as a stream of chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// All backends (S3-compatible object storage, local filesystem, remote file
/// manager) implement this trait, so the upload pipeline never knows which one
/// it is writing to. Keys arrive already validated as [`StorageKey`]; each
/// backend maps them into its own namespace (bucket prefix, base directory,
/// root path).
#[async_trait]
pub trait Storage: Send + Sync {
    /// Write `data` under `key`, replacing any existing object.
    ///
    /// `content_length` is a hint; backends that need the full size up front
    /// buffer as required. On error, no partial object is visible under `key`.
    async fn create(
        &self,
        key: &StorageKey,
        data: ByteStream,
        content_length: Option<u64>,
        content_type: &str,
    ) -> StorageResult<StorageObjectMeta>;

    /// Stream the object's content.
    async fn read(&self, key: &StorageKey) -> StorageResult<ByteStream>;

    /// Remove the object. Deleting a missing key is not an error.
    async fn delete(&self, key: &StorageKey) -> StorageResult<()>;

    /// Object metadata, or `NotFound`.
    async fn meta(&self, key: &StorageKey) -> StorageResult<StorageObjectMeta>;

    /// Publicly reachable URL for the key. Pure string composition.
    fn public_url(&self, key: &StorageKey) -> String;

    /// Objects under `prefix`, keys relative to the backend namespace.
    fn list<'a>(&'a self, prefix: &'a str) -> BoxStream<'a, StorageResult<StorageObjectMeta>>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
