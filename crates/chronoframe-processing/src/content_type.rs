//! Content type resolution for uploads.
//!
//! Browsers without native HEIC/HEIF or QuickTime support send those files as
//! `application/octet-stream`. Only then is the key's extension consulted, and
//! only against a short fixed table; any specific declared type is kept.

use chronoframe_core::models::{ContentType, StorageKey};

/// Extensions commonly misreported by browser upload clients.
const EXTENSION_CONTENT_TYPES: &[(&str, &str)] = &[
    ("heic", "image/heic"),
    ("heif", "image/heif"),
    ("mov", "video/quicktime"),
    ("mp4", "video/mp4"),
];

pub struct ContentTypeResolver;

impl ContentTypeResolver {
    /// Resolve the effective content type of an upload.
    ///
    /// A declared type other than the generic fallback wins. Otherwise the
    /// extension table is consulted, and failing that the declared value (or
    /// the generic fallback when none was sent) is returned as-is.
    pub fn resolve(key: &StorageKey, declared: Option<&str>) -> ContentType {
        let declared = declared.map(ContentType::new).unwrap_or_else(ContentType::generic);
        if !declared.is_generic() {
            return declared;
        }

        key.extension()
            .and_then(|ext| Self::lookup_extension(&ext))
            .map(ContentType::new)
            .unwrap_or(declared)
    }

    fn lookup_extension(extension: &str) -> Option<&'static str> {
        EXTENSION_CONTENT_TYPES
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, content_type)| *content_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> StorageKey {
        StorageKey::parse(raw).unwrap()
    }

    #[test]
    fn test_generic_type_inferred_from_extension() {
        let resolved =
            ContentTypeResolver::resolve(&key("photo.heic"), Some("application/octet-stream"));
        assert_eq!(resolved.as_str(), "image/heic");

        let resolved = ContentTypeResolver::resolve(&key("2024/01/IMG.MOV"), None);
        assert_eq!(resolved.as_str(), "video/quicktime");

        let resolved = ContentTypeResolver::resolve(&key("clip.mp4"), Some(""));
        assert_eq!(resolved.as_str(), "video/mp4");
    }

    #[test]
    fn test_declared_type_wins() {
        let resolved = ContentTypeResolver::resolve(&key("photo.heic"), Some("image/png"));
        assert_eq!(resolved.as_str(), "image/png");
    }

    #[test]
    fn test_unknown_extension_keeps_declared() {
        let resolved =
            ContentTypeResolver::resolve(&key("notes.xyz"), Some("application/octet-stream"));
        assert_eq!(resolved.as_str(), "application/octet-stream");

        let resolved = ContentTypeResolver::resolve(&key("noext"), None);
        assert!(resolved.is_generic());

        // Not a general sniffer: common types outside the table stay generic.
        let resolved = ContentTypeResolver::resolve(&key("photo.jpg"), None);
        assert!(resolved.is_generic());
    }
}
