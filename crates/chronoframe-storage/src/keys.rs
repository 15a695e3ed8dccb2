//! Shared key handling for storage backends.
//!
//! Backends place validated keys under their own namespace (an S3 prefix, a
//! remote root path). These helpers keep the join/strip rules identical across
//! backends so `list` returns keys that round-trip through `create`.

/// Trim surrounding slashes so a namespace joins with exactly one separator.
pub fn normalize_namespace(namespace: &str) -> String {
    namespace.trim_matches('/').to_string()
}

/// `{namespace}/{key}`, or `key` when the namespace is empty.
pub fn join_namespace(namespace: &str, key: &str) -> String {
    if namespace.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", namespace, key)
    }
}

/// Inverse of [`join_namespace`]. Returns `None` for paths outside the namespace.
pub fn strip_namespace<'a>(namespace: &str, path: &'a str) -> Option<&'a str> {
    if namespace.is_empty() {
        return Some(path.trim_start_matches('/'));
    }
    path.trim_start_matches('/')
        .strip_prefix(namespace)
        .and_then(|rest| rest.strip_prefix('/'))
}

/// Content type derived from the key's extension, for backends that do not
/// persist the type supplied at write time.
pub fn guess_content_type(key: &str) -> Option<String> {
    mime_guess::from_path(key).first().map(|m| m.essence_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_and_strip_namespace() {
        let ns = normalize_namespace("/photos/");
        assert_eq!(ns, "photos");
        let joined = join_namespace(&ns, "2024/a.jpg");
        assert_eq!(joined, "photos/2024/a.jpg");
        assert_eq!(strip_namespace(&ns, &joined), Some("2024/a.jpg"));
        assert_eq!(strip_namespace(&ns, "other/a.jpg"), None);
        assert_eq!(strip_namespace(&ns, "photosx/a.jpg"), None);
        assert_eq!(join_namespace("", "a.jpg"), "a.jpg");
        assert_eq!(strip_namespace("", "/a.jpg"), Some("a.jpg"));
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("a/b.JPG").as_deref(), Some("image/jpeg"));
        assert_eq!(guess_content_type("clip.mp4").as_deref(), Some("video/mp4"));
        assert_eq!(guess_content_type("noext"), None);
    }
}
