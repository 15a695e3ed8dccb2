//! In-memory photo index, used when no database is configured.

use async_trait::async_trait;
use chronoframe_core::models::{Fingerprint, StorageKey};
use chronoframe_core::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::photo_index::{PhotoIndex, UploadRecord};

#[derive(Default)]
struct Entries {
    /// Insertion order preserved so lookups return the earliest key.
    by_key: Vec<(StorageKey, Fingerprint)>,
    position: HashMap<StorageKey, usize>,
}

/// Process-local index. Contents are lost on restart.
#[derive(Default)]
pub struct InMemoryPhotoIndex {
    entries: RwLock<Entries>,
}

impl InMemoryPhotoIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PhotoIndex for InMemoryPhotoIndex {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<StorageKey>, AppError> {
        let entries = self.entries.read().await;
        Ok(entries
            .by_key
            .iter()
            .find(|(_, fp)| fp == fingerprint)
            .map(|(key, _)| key.clone()))
    }

    async fn record_upload(&self, record: &UploadRecord) -> Result<(), AppError> {
        let mut entries = self.entries.write().await;
        match entries.position.get(&record.key).copied() {
            Some(idx) => entries.by_key[idx].1 = record.fingerprint.clone(),
            None => {
                let idx = entries.by_key.len();
                entries
                    .by_key
                    .push((record.key.clone(), record.fingerprint.clone()));
                entries.position.insert(record.key.clone(), idx);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronoframe_core::StorageBackend;

    fn record(key: &str, fingerprint: &str) -> UploadRecord {
        UploadRecord {
            key: StorageKey::parse(key).unwrap(),
            fingerprint: Fingerprint::new(fingerprint),
            size: 10,
            content_type: "video/quicktime".to_string(),
            storage_provider: StorageBackend::S3,
            uploaded_by: None,
        }
    }

    #[tokio::test]
    async fn test_earliest_key_wins_and_overwrite_replaces() {
        let index = InMemoryPhotoIndex::new();
        index.record_upload(&record("first.mov", "h1")).await.unwrap();
        index.record_upload(&record("second.mov", "h1")).await.unwrap();

        let found = index.find_by_fingerprint(&Fingerprint::new("h1")).await.unwrap();
        assert_eq!(found.unwrap().as_str(), "first.mov");

        index.record_upload(&record("first.mov", "h2")).await.unwrap();
        let found = index.find_by_fingerprint(&Fingerprint::new("h1")).await.unwrap();
        assert_eq!(found.unwrap().as_str(), "second.mov");
    }
}
