//! Upload pipeline: authenticate → key → content type → spool → policy → store.
//!
//! Cheap checks (session, key, whitelist, declared length) run before the body
//! is read. The body is then spooled with an early size abort, the full policy
//! runs on the received payload, and only an allowed upload reaches storage.

use std::sync::Arc;

use chronoframe_core::models::{ContentType, StorageKey};
use chronoframe_core::UploadConfig;
use chronoframe_db::{PhotoIndex, UploadRecord};
use chronoframe_storage::Storage;

use super::locks::KeyLocks;
use super::spool::{spool, SpoolError, SpooledPayload};
use super::types::{UploadDisposition, UploadError, UploadOutcome, UploadRequest};
use crate::content_type::ContentTypeResolver;
use crate::fingerprint::{Fingerprinter, Sha256Fingerprinter};
use crate::policy::{Allowance, Decision, Rejection, UploadPolicy};

impl From<Rejection> for UploadError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::UnsupportedMediaType {
                content_type,
                allowed,
            } => UploadError::UnsupportedMediaType {
                content_type: content_type.to_string(),
                allowed,
            },
            Rejection::PayloadTooLarge { size, max } => UploadError::PayloadTooLarge { size, max },
            Rejection::DuplicateContent { existing_key } => {
                UploadError::DuplicateContent { existing_key }
            }
        }
    }
}

pub struct UploadPipeline {
    storage: Arc<dyn Storage>,
    index: Arc<dyn PhotoIndex>,
    policy: UploadPolicy,
    fingerprinter: Arc<dyn Fingerprinter>,
    locks: Option<KeyLocks>,
    spool_memory_bytes: u64,
}

impl UploadPipeline {
    pub fn new(storage: Arc<dyn Storage>, index: Arc<dyn PhotoIndex>, config: &UploadConfig) -> Self {
        Self {
            policy: UploadPolicy::new(config, index.clone()),
            storage,
            index,
            fingerprinter: Arc::new(Sha256Fingerprinter),
            locks: config.serialize_same_key.then(KeyLocks::new),
            spool_memory_bytes: config.spool_memory_bytes,
        }
    }

    /// Replace the default SHA-256 fingerprint source.
    pub fn with_fingerprinter(mut self, fingerprinter: Arc<dyn Fingerprinter>) -> Self {
        self.fingerprinter = fingerprinter;
        self
    }

    /// Run one upload to completion.
    ///
    /// Dropping the returned future (client disconnect) abandons the upload:
    /// the body is never fully spooled and storage is never called.
    #[tracing::instrument(skip(self, request), fields(key = ?request.key))]
    pub async fn handle(&self, request: UploadRequest) -> Result<UploadOutcome, UploadError> {
        let user = request.acting_user.ok_or(UploadError::Unauthorized)?;

        let raw_key = request
            .key
            .filter(|k| !k.is_empty())
            .ok_or(UploadError::MissingKey)?;
        let key = match StorageKey::normalize(&raw_key) {
            Ok(key) => key,
            Err(chronoframe_core::models::KeyError::Empty) => return Err(UploadError::MissingKey),
            Err(e) => return Err(UploadError::InvalidKey(e)),
        };

        let content_type =
            ContentTypeResolver::resolve(&key, request.declared_content_type.as_deref());

        if let Err(rejection) = self.policy.check_content_type(&content_type) {
            tracing::warn!(
                content_type = %content_type,
                declared = ?request.declared_content_type,
                key = %key,
                "MIME type rejected"
            );
            return Err(rejection.into());
        }
        if let Some(declared_length) = request.content_length {
            self.policy.check_size(declared_length)?;
        }

        let _guard = match self.locks {
            Some(ref locks) => Some(locks.acquire(&key).await),
            None => None,
        };

        let hasher = self
            .policy
            .wants_fingerprint()
            .then(|| self.fingerprinter.start());
        let payload = spool(
            request.body,
            self.policy.max_payload_bytes(),
            self.spool_memory_bytes,
            hasher,
        )
        .await
        .map_err(|e| match e {
            SpoolError::TooLarge { observed, max } => UploadError::PayloadTooLarge {
                size: request.content_length.unwrap_or(observed).max(observed),
                max,
            },
            SpoolError::Body(msg) => UploadError::MalformedBody(msg),
            SpoolError::Io(e) => {
                tracing::error!(error = %e, key = %key, "Failed to spool upload body");
                UploadError::StorageWriteFailed(e.into())
            }
        })?;

        if payload.size() == 0 {
            return Err(UploadError::MalformedBody("Request body is empty".to_string()));
        }

        let allowance = match self
            .policy
            .authorize(&key, &content_type, payload.size(), payload.fingerprint())
            .await
        {
            Decision::Allow(allowance) => allowance,
            Decision::Reject(rejection) => {
                tracing::info!(key = %key, rejection = ?rejection, "Upload rejected by policy");
                return Err(rejection.into());
            }
        };

        let existing_key = match allowance {
            Allowance::SkipExisting(existing) => {
                tracing::info!(key = %key, existing_key = %existing, "Duplicate upload skipped");
                return Ok(UploadOutcome {
                    key: existing,
                    disposition: UploadDisposition::SkippedDuplicate,
                });
            }
            Allowance::ProceedWithWarning(existing) => Some(existing),
            Allowance::Proceed => None,
        };

        let meta = self.store(&key, payload, &content_type, user.id).await?;

        let disposition = match existing_key {
            Some(existing_key) => {
                tracing::warn!(key = %key, existing_key = %existing_key, "Stored duplicate upload");
                UploadDisposition::StoredDuplicate { meta, existing_key }
            }
            None => UploadDisposition::Stored(meta),
        };

        Ok(UploadOutcome { key, disposition })
    }

    async fn store(
        &self,
        key: &StorageKey,
        payload: SpooledPayload,
        content_type: &ContentType,
        user_id: i64,
    ) -> Result<chronoframe_core::models::StorageObjectMeta, UploadError> {
        let size = payload.size();
        let fingerprint = payload.fingerprint().cloned();

        let data = payload
            .into_stream()
            .await
            .map_err(UploadError::StorageWriteFailed)?;

        let meta = self
            .storage
            .create(key, data, Some(size), content_type.as_str())
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    key = %key,
                    provider = %self.storage.backend_type(),
                    "Storage provider create error"
                );
                UploadError::StorageWriteFailed(e)
            })?;

        if let Some(fingerprint) = fingerprint {
            let record = UploadRecord {
                key: key.clone(),
                fingerprint,
                size,
                content_type: content_type.to_string(),
                storage_provider: self.storage.backend_type(),
                uploaded_by: Some(user_id),
            };
            if let Err(e) = self.index.record_upload(&record).await {
                tracing::warn!(error = %e, key = %key, "Failed to record upload fingerprint");
            }
        }

        tracing::info!(
            key = %key,
            size_bytes = size,
            content_type = %content_type,
            user_id,
            "Upload stored"
        );

        Ok(meta)
    }
}
