//! Storage key and object metadata: backend-agnostic references to stored objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Reasons a raw key cannot become a [`StorageKey`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("storage key is empty")]
    Empty,

    #[error("storage key must not start with '/': {0}")]
    LeadingSlash(String),

    #[error("storage key contains a '..' segment: {0}")]
    Traversal(String),

    #[error("storage key contains a NUL byte")]
    NulByte,
}

/// A normalized, slash-separated relative path identifying an object.
///
/// Invariants: non-empty, no leading `/`, no `..` segment. Every backend receives
/// keys of this type only, so an unsanitized string can never reach storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StorageKey(String);

impl StorageKey {
    /// Validate `raw` as-is. Does not strip anything.
    pub fn parse(raw: &str) -> Result<Self, KeyError> {
        if raw.is_empty() {
            return Err(KeyError::Empty);
        }
        if raw.starts_with('/') {
            return Err(KeyError::LeadingSlash(raw.to_string()));
        }
        if raw.contains('\0') {
            return Err(KeyError::NulByte);
        }
        if raw.split('/').any(|segment| segment == "..") {
            return Err(KeyError::Traversal(raw.to_string()));
        }
        Ok(StorageKey(raw.to_string()))
    }

    /// Strip leading slashes, then validate. Path segments are otherwise left untouched.
    pub fn normalize(raw: &str) -> Result<Self, KeyError> {
        Self::parse(raw.trim_start_matches('/'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased last dot-segment of the final path segment, if any.
    pub fn extension(&self) -> Option<String> {
        let file_name = self.0.rsplit('/').next().unwrap_or(&self.0);
        match file_name.rfind('.') {
            Some(idx) if idx + 1 < file_name.len() => Some(file_name[idx + 1..].to_lowercase()),
            _ => None,
        }
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for StorageKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl FromStr for StorageKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StorageKey::parse(s)
    }
}

impl AsRef<str> for StorageKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for StorageKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        StorageKey::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Backend-reported metadata for a stored object. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageObjectMeta {
    pub key: StorageKey,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
}

impl StorageObjectMeta {
    /// Equality ignoring `last_modified`.
    pub fn same_content_as(&self, other: &StorageObjectMeta) -> bool {
        self.key == other.key
            && self.size == other.size
            && self.content_type == other.content_type
            && self.etag == other.etag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_is_identity_for_clean_keys() {
        for raw in ["a", "2024/01/img.mov", "photos/a.b.c.jpg", "x/y/z/..hidden", "a./b"] {
            let key = StorageKey::normalize(raw).unwrap();
            assert_eq!(key.as_str(), raw);
        }
    }

    #[test]
    fn test_normalize_strips_leading_slashes() {
        let key = StorageKey::normalize("///2024/img.jpg").unwrap();
        assert_eq!(key.as_str(), "2024/img.jpg");
    }

    #[test]
    fn test_parse_rejects_invalid_keys() {
        assert_eq!(StorageKey::parse(""), Err(KeyError::Empty));
        assert!(matches!(
            StorageKey::parse("/etc/passwd"),
            Err(KeyError::LeadingSlash(_))
        ));
        assert!(matches!(
            StorageKey::parse("a/../../etc"),
            Err(KeyError::Traversal(_))
        ));
        assert!(matches!(StorageKey::parse(".."), Err(KeyError::Traversal(_))));
        assert_eq!(StorageKey::parse("a\0b"), Err(KeyError::NulByte));
        assert_eq!(StorageKey::normalize("///"), Err(KeyError::Empty));
    }

    #[test]
    fn test_extension() {
        let key = StorageKey::parse("2024/01/IMG_001.HEIC").unwrap();
        assert_eq!(key.extension().as_deref(), Some("heic"));
        assert_eq!(key.file_name(), "IMG_001.HEIC");

        assert_eq!(StorageKey::parse("dir.d/noext").unwrap().extension(), None);
        assert_eq!(StorageKey::parse("trailing.").unwrap().extension(), None);
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: StorageKey = serde_json::from_str("\"a/b.jpg\"").unwrap();
        assert_eq!(ok.as_str(), "a/b.jpg");
        assert!(serde_json::from_str::<StorageKey>("\"../x\"").is_err());
    }
}
