//! In-memory `Storage` double that records every `create` call.

use async_trait::async_trait;
use chronoframe_core::models::{StorageKey, StorageObjectMeta};
use chronoframe_storage::{ByteStream, Storage, StorageBackend, StorageError, StorageResult};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub struct CreateCall {
    pub key: String,
    pub content_type: String,
    pub size: u64,
}

pub struct RecordingStorage {
    calls: Mutex<Vec<CreateCall>>,
    fail: bool,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<CreateCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn create_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Storage for RecordingStorage {
    async fn create(
        &self,
        key: &StorageKey,
        mut data: ByteStream,
        _content_length: Option<u64>,
        content_type: &str,
    ) -> StorageResult<StorageObjectMeta> {
        let mut size = 0u64;
        while let Some(chunk) = data.next().await {
            size += chunk?.len() as u64;
        }

        self.calls.lock().unwrap().push(CreateCall {
            key: key.to_string(),
            content_type: content_type.to_string(),
            size,
        });

        if self.fail {
            return Err(StorageError::UploadFailed("backend unavailable".to_string()));
        }

        Ok(StorageObjectMeta {
            key: key.clone(),
            size,
            content_type: Some(content_type.to_string()),
            etag: None,
            last_modified: None,
        })
    }

    async fn read(&self, key: &StorageKey) -> StorageResult<ByteStream> {
        Err(StorageError::NotFound(key.to_string()))
    }

    async fn delete(&self, _key: &StorageKey) -> StorageResult<()> {
        Ok(())
    }

    async fn meta(&self, key: &StorageKey) -> StorageResult<StorageObjectMeta> {
        Err(StorageError::NotFound(key.to_string()))
    }

    fn public_url(&self, key: &StorageKey) -> String {
        format!("memory://{}", key)
    }

    fn list<'a>(&'a self, _prefix: &'a str) -> BoxStream<'a, StorageResult<StorageObjectMeta>> {
        futures::stream::empty::<Result<StorageObjectMeta, StorageError>>().boxed()
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

