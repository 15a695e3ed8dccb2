//! Upload policy: MIME whitelist, size ceiling, duplicate content.
//!
//! Checks run in a fixed order and stop at the first rejection:
//! whitelist, then size, then duplicate. The first two are config-only; the
//! duplicate check consults the photo index with an already-computed fingerprint.

use chronoframe_core::models::{ContentType, DuplicateMode, DuplicatePolicy, Fingerprint, StorageKey};
use chronoframe_core::UploadConfig;
use chronoframe_db::PhotoIndex;
use std::sync::Arc;

/// Why an upload was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    UnsupportedMediaType {
        content_type: ContentType,
        allowed: Vec<String>,
    },
    PayloadTooLarge {
        size: u64,
        max: u64,
    },
    DuplicateContent {
        existing_key: StorageKey,
    },
}

/// How an allowed upload should proceed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allowance {
    /// Write it.
    Proceed,
    /// Identical content exists; return this key without writing.
    SkipExisting(StorageKey),
    /// Identical content exists at this key; write anyway and warn.
    ProceedWithWarning(StorageKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow(Allowance),
    Reject(Rejection),
}

pub struct UploadPolicy {
    whitelist_enabled: bool,
    whitelist: Vec<String>,
    max_payload_bytes: u64,
    duplicate: DuplicatePolicy,
    index: Arc<dyn PhotoIndex>,
}

impl UploadPolicy {
    pub fn new(config: &UploadConfig, index: Arc<dyn PhotoIndex>) -> Self {
        let whitelist = config
            .mime_whitelist
            .split(',')
            .map(|entry| ContentType::new(entry).as_str().to_string())
            .filter(|entry| !entry.is_empty())
            .collect();

        Self {
            whitelist_enabled: config.mime_whitelist_enabled,
            whitelist,
            max_payload_bytes: config.max_payload_bytes,
            duplicate: config.duplicate_check,
            index,
        }
    }

    pub fn max_payload_bytes(&self) -> u64 {
        self.max_payload_bytes
    }

    /// Whether `authorize` will look at a fingerprint.
    pub fn wants_fingerprint(&self) -> bool {
        self.duplicate.enabled
    }

    pub fn allowed_types(&self) -> &[String] {
        &self.whitelist
    }

    /// Whitelist gate. An enabled but empty whitelist allows everything.
    pub fn check_content_type(&self, content_type: &ContentType) -> Result<(), Rejection> {
        if !self.whitelist_enabled || self.whitelist.is_empty() {
            return Ok(());
        }
        if self.whitelist.iter().any(|allowed| allowed == content_type.as_str()) {
            return Ok(());
        }
        Err(Rejection::UnsupportedMediaType {
            content_type: content_type.clone(),
            allowed: self.whitelist.clone(),
        })
    }

    pub fn check_size(&self, size: u64) -> Result<(), Rejection> {
        if size > self.max_payload_bytes {
            return Err(Rejection::PayloadTooLarge {
                size,
                max: self.max_payload_bytes,
            });
        }
        Ok(())
    }

    /// Run all checks for a fully received payload bound for `key`.
    ///
    /// A failing index lookup is logged and treated as "no duplicate": the
    /// upload itself is not blocked by an unavailable index. Content already
    /// indexed under `key` itself is a retry, not a duplicate.
    pub async fn authorize(
        &self,
        key: &StorageKey,
        content_type: &ContentType,
        size: u64,
        fingerprint: Option<&Fingerprint>,
    ) -> Decision {
        if let Err(rejection) = self.check_content_type(content_type) {
            return Decision::Reject(rejection);
        }
        if let Err(rejection) = self.check_size(size) {
            return Decision::Reject(rejection);
        }

        let fingerprint = match fingerprint {
            Some(fp) if self.duplicate.enabled => fp,
            _ => return Decision::Allow(Allowance::Proceed),
        };

        let existing = match self.index.find_by_fingerprint(fingerprint).await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fingerprint = %fingerprint,
                    "Duplicate lookup failed, continuing without duplicate check"
                );
                None
            }
        };

        match (existing, self.duplicate.mode) {
            (None, _) => Decision::Allow(Allowance::Proceed),
            (Some(existing), _) if &existing == key => Decision::Allow(Allowance::Proceed),
            (Some(key), DuplicateMode::Skip) => Decision::Allow(Allowance::SkipExisting(key)),
            (Some(key), DuplicateMode::Warn) => Decision::Allow(Allowance::ProceedWithWarning(key)),
            (Some(key), DuplicateMode::Block) => {
                Decision::Reject(Rejection::DuplicateContent { existing_key: key })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronoframe_core::StorageBackend;
    use chronoframe_db::{InMemoryPhotoIndex, UploadRecord};

    const MIB: u64 = 1024 * 1024;

    fn config(whitelist_enabled: bool, whitelist: &str, duplicate: Option<DuplicateMode>) -> UploadConfig {
        UploadConfig {
            mime_whitelist_enabled: whitelist_enabled,
            mime_whitelist: whitelist.to_string(),
            duplicate_check: DuplicatePolicy {
                enabled: duplicate.is_some(),
                mode: duplicate.unwrap_or(DuplicateMode::Skip),
            },
            ..Default::default()
        }
    }

    fn target() -> StorageKey {
        StorageKey::parse("2024/upload.jpg").unwrap()
    }

    async fn index_with(key: &str, fingerprint: &str) -> Arc<dyn PhotoIndex> {
        let index = InMemoryPhotoIndex::new();
        index
            .record_upload(&UploadRecord {
                key: StorageKey::parse(key).unwrap(),
                fingerprint: Fingerprint::new(fingerprint),
                size: 1,
                content_type: "image/jpeg".to_string(),
                storage_provider: StorageBackend::Local,
                uploaded_by: Some(1),
            })
            .await
            .unwrap();
        Arc::new(index)
    }

    #[tokio::test]
    async fn test_whitelist_enforced_only_when_enabled() {
        let index: Arc<dyn PhotoIndex> = Arc::new(InMemoryPhotoIndex::new());
        let jpeg = ContentType::new("image/jpeg");
        let tiff = ContentType::new("image/tiff");

        let enabled = UploadPolicy::new(&config(true, "image/jpeg, video/quicktime", None), index.clone());
        assert_eq!(enabled.authorize(&target(), &jpeg, MIB, None).await, Decision::Allow(Allowance::Proceed));
        assert_eq!(
            enabled.authorize(&target(), &tiff, MIB, None).await,
            Decision::Reject(Rejection::UnsupportedMediaType {
                content_type: tiff.clone(),
                allowed: vec!["image/jpeg".to_string(), "video/quicktime".to_string()],
            })
        );

        let disabled = UploadPolicy::new(&config(false, "image/jpeg", None), index.clone());
        assert_eq!(disabled.authorize(&target(), &tiff, MIB, None).await, Decision::Allow(Allowance::Proceed));

        let empty = UploadPolicy::new(&config(true, " , ", None), index);
        assert_eq!(empty.authorize(&target(), &tiff, MIB, None).await, Decision::Allow(Allowance::Proceed));
    }

    #[tokio::test]
    async fn test_size_ceiling() {
        let policy = UploadPolicy::new(&config(false, "", None), Arc::new(InMemoryPhotoIndex::new()));
        let jpeg = ContentType::new("image/jpeg");

        assert_eq!(
            policy.authorize(&target(), &jpeg, 128 * MIB, None).await,
            Decision::Allow(Allowance::Proceed)
        );
        assert_eq!(
            policy.authorize(&target(), &jpeg, 128 * MIB + 1, None).await,
            Decision::Reject(Rejection::PayloadTooLarge {
                size: 128 * MIB + 1,
                max: 128 * MIB,
            })
        );
    }

    #[tokio::test]
    async fn test_whitelist_checked_before_size() {
        let policy = UploadPolicy::new(&config(true, "image/jpeg", None), Arc::new(InMemoryPhotoIndex::new()));
        let decision = policy
            .authorize(&target(), &ContentType::new("image/tiff"), 500 * MIB, None)
            .await;
        assert!(matches!(
            decision,
            Decision::Reject(Rejection::UnsupportedMediaType { .. })
        ));
    }

    #[tokio::test]
    async fn test_duplicate_modes() {
        let jpeg = ContentType::new("image/jpeg");
        let fp = Fingerprint::new("h1");
        let existing = StorageKey::parse("2024/original.jpg").unwrap();

        let skip = UploadPolicy::new(
            &config(false, "", Some(DuplicateMode::Skip)),
            index_with("2024/original.jpg", "h1").await,
        );
        assert_eq!(
            skip.authorize(&target(), &jpeg, 10, Some(&fp)).await,
            Decision::Allow(Allowance::SkipExisting(existing.clone()))
        );

        let warn = UploadPolicy::new(
            &config(false, "", Some(DuplicateMode::Warn)),
            index_with("2024/original.jpg", "h1").await,
        );
        assert_eq!(
            warn.authorize(&target(), &jpeg, 10, Some(&fp)).await,
            Decision::Allow(Allowance::ProceedWithWarning(existing.clone()))
        );

        let block = UploadPolicy::new(
            &config(false, "", Some(DuplicateMode::Block)),
            index_with("2024/original.jpg", "h1").await,
        );
        assert_eq!(
            block.authorize(&target(), &jpeg, 10, Some(&fp)).await,
            Decision::Reject(Rejection::DuplicateContent {
                existing_key: existing
            })
        );
        assert_eq!(
            block.authorize(&target(), &jpeg, 10, Some(&Fingerprint::new("other"))).await,
            Decision::Allow(Allowance::Proceed)
        );
    }

    #[tokio::test]
    async fn test_same_key_is_not_its_own_duplicate() {
        let jpeg = ContentType::new("image/jpeg");
        let fp = Fingerprint::new("h1");
        let key = StorageKey::parse("2024/original.jpg").unwrap();

        for mode in [DuplicateMode::Skip, DuplicateMode::Warn, DuplicateMode::Block] {
            let policy = UploadPolicy::new(
                &config(false, "", Some(mode)),
                index_with("2024/original.jpg", "h1").await,
            );
            assert_eq!(
                policy.authorize(&key, &jpeg, 10, Some(&fp)).await,
                Decision::Allow(Allowance::Proceed)
            );
        }
    }

    #[tokio::test]
    async fn test_duplicate_check_disabled_ignores_index() {
        let policy = UploadPolicy::new(&config(false, "", None), index_with("a.jpg", "h1").await);
        assert!(!policy.wants_fingerprint());
        assert_eq!(
            policy
                .authorize(&target(), &ContentType::new("image/jpeg"), 10, Some(&Fingerprint::new("h1")))
                .await,
            Decision::Allow(Allowance::Proceed)
        );
    }
}
