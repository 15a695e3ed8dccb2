//! Photo index: the duplicate-detection collaborator of the upload pipeline.

use async_trait::async_trait;
use chronoframe_core::models::{Fingerprint, StorageKey};
use chronoframe_core::{AppError, StorageBackend};

/// A committed upload as remembered by the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRecord {
    pub key: StorageKey,
    pub fingerprint: Fingerprint,
    pub size: u64,
    pub content_type: String,
    pub storage_provider: StorageBackend,
    pub uploaded_by: Option<i64>,
}

/// Existence lookups by content fingerprint.
///
/// Recording is keyed by storage key: a new upload under an existing key
/// replaces that key's fingerprint. Lookups return the earliest key still
/// carrying the fingerprint.
#[async_trait]
pub trait PhotoIndex: Send + Sync {
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<StorageKey>, AppError>;

    async fn record_upload(&self, record: &UploadRecord) -> Result<(), AppError>;
}
