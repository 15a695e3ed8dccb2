use crate::keys::{guess_content_type, join_namespace, normalize_namespace, strip_namespace};
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronoframe_core::models::{StorageKey, StorageObjectMeta};
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Suffix of in-flight upload files; never visible through `list`.
const TEMP_SUFFIX: &str = ".chronoframe-upload";

/// Local filesystem storage implementation
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_canonical: PathBuf,
    base_url: String,
    /// Directory under `base_path` every key lives in; empty for none.
    namespace: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for file storage (e.g., "./data/storage")
    /// * `base_url` - URL prefix the root directory is served under (e.g., "/storage")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let base_canonical = fs::canonicalize(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
        })?;

        Ok(LocalStorage {
            base_path,
            base_canonical,
            base_url,
            namespace: String::new(),
        })
    }

    /// Place every key under `namespace` (e.g. "photos/") inside the base directory.
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.namespace = normalize_namespace(namespace);
        self
    }

    /// Filesystem path for a key, namespace included.
    async fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        self.resolve(&join_namespace(&self.namespace, key)).await
    }

    /// Convert a path relative to the base directory into a filesystem path
    ///
    /// Every component must be a plain name, and the resolved path must stay
    /// under the base directory even through symlinks.
    async fn resolve(&self, relative: &str) -> StorageResult<PathBuf> {
        let relative_path = Path::new(relative);
        if !relative_path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(StorageError::InvalidKey(format!(
                "Storage key escapes storage directory: {}",
                relative
            )));
        }

        let path = self.base_path.join(relative_path);

        // Check the deepest existing ancestor; the rest of the path is created below it.
        let mut existing = path.as_path();
        while !fs::try_exists(existing).await? {
            match existing.parent() {
                Some(parent) => existing = parent,
                None => break,
            }
        }
        if let Ok(canonical) = fs::canonicalize(existing).await {
            if canonical.strip_prefix(&self.base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    fn path_to_key(&self, path: &Path) -> Option<StorageKey> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let joined = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?
            .join("/");
        let key = strip_namespace(&self.namespace, &joined)?;
        StorageKey::parse(key).ok()
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Stream into `temp_path`, flushed to disk. Returns bytes written.
    async fn write_temp(&self, temp_path: &Path, mut data: ByteStream) -> StorageResult<u64> {
        let mut file = fs::File::create(temp_path).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        let mut written = 0u64;
        while let Some(chunk) = data.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            written += chunk.len() as u64;
        }

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to sync file {}: {}",
                temp_path.display(),
                e
            ))
        })?;

        Ok(written)
    }

    /// Plain files carry no content type, so `meta` and `list` report the one
    /// implied by the key's extension, not the type passed to `create`.
    fn file_meta(key: StorageKey, metadata: &std::fs::Metadata) -> StorageObjectMeta {
        let content_type = guess_content_type(key.as_str());
        StorageObjectMeta {
            key,
            size: metadata.len(),
            content_type,
            etag: None,
            last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        }
    }
}

/// Removes an in-flight temp file unless disarmed, including when the
/// owning `create` future is dropped mid-write.
struct TempFileGuard {
    path: Option<PathBuf>,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    fn disarm(&mut self) {
        self.path = None;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(ref path) = self.path {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(error = %e, path = %path.display(), "Failed to remove temp upload file");
                }
            }
        }
    }
}

struct ListState<'a> {
    storage: &'a LocalStorage,
    prefix: &'a str,
    /// Base-relative directory the walk starts from, resolved on first poll.
    start: Option<String>,
    pending: Vec<PathBuf>,
    current: Option<fs::ReadDir>,
}

#[async_trait]
impl Storage for LocalStorage {
    async fn create(
        &self,
        key: &StorageKey,
        data: ByteStream,
        _content_length: Option<u64>,
        content_type: &str,
    ) -> StorageResult<StorageObjectMeta> {
        let path = self.key_to_path(key.as_str()).await?;
        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();
        let temp_path = path.with_file_name(format!(
            ".{}.{}{}",
            key.file_name(),
            Uuid::new_v4().simple(),
            TEMP_SUFFIX
        ));

        let mut guard = TempFileGuard::new(temp_path.clone());

        let written = match self.write_temp(&temp_path, data).await {
            Ok(written) => written,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    path = %path.display(),
                    key = %key,
                    "Local storage upload failed"
                );
                return Err(e);
            }
        };

        if let Err(e) = fs::rename(&temp_path, &path).await {
            return Err(StorageError::UploadFailed(format!(
                "Failed to move file into place {}: {}",
                path.display(),
                e
            )));
        }

        guard.disarm();

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = written,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage upload successful"
        );

        Ok(StorageObjectMeta {
            key: key.clone(),
            size: written,
            content_type: Some(content_type.to_string()),
            etag: None,
            last_modified: Some(Utc::now()),
        })
    }

    async fn read(&self, key: &StorageKey) -> StorageResult<ByteStream> {
        let path = self.key_to_path(key.as_str()).await?;

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        let stream = tokio_util::io::ReaderStream::new(file).map(|result| {
            result.map_err(|e| StorageError::DownloadFailed(format!("Failed to read chunk: {}", e)))
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &StorageKey) -> StorageResult<()> {
        let path = self.key_to_path(key.as_str()).await?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), key = %key, "Local storage delete successful");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn meta(&self, key: &StorageKey) -> StorageResult<StorageObjectMeta> {
        let path = self.key_to_path(key.as_str()).await?;
        match fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => Ok(Self::file_meta(key.clone(), &metadata)),
            Ok(_) => Err(StorageError::NotFound(key.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn public_url(&self, key: &StorageKey) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            join_namespace(&self.namespace, key.as_str())
        )
    }

    fn list<'a>(&'a self, prefix: &'a str) -> BoxStream<'a, StorageResult<StorageObjectMeta>> {
        let prefix = prefix.trim_start_matches('/');
        // Start from the deepest directory named by the prefix, filter the rest by string prefix.
        let dir_part = prefix.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let start = join_namespace(&self.namespace, dir_part)
            .trim_end_matches('/')
            .to_string();

        let state = ListState {
            storage: self,
            prefix,
            start: Some(start),
            pending: Vec::new(),
            current: None,
        };

        stream::unfold(state, |mut st| async move {
            loop {
                if let Some(start) = st.start.take() {
                    let resolved = if start.is_empty() {
                        Ok(st.storage.base_path.clone())
                    } else {
                        st.storage.resolve(&start).await
                    };
                    match resolved {
                        Ok(dir) => st.pending.push(dir),
                        Err(e) => return Some((Err(e), st)),
                    }
                }

                if st.current.is_none() {
                    let dir = st.pending.pop()?;
                    match fs::read_dir(&dir).await {
                        Ok(read_dir) => st.current = Some(read_dir),
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                        Err(e) => return Some((Err(StorageError::IoError(e)), st)),
                    }
                }

                let next = match st.current.as_mut() {
                    Some(read_dir) => read_dir.next_entry().await,
                    None => continue,
                };

                let entry = match next {
                    Ok(Some(entry)) => entry,
                    Ok(None) => {
                        st.current = None;
                        continue;
                    }
                    Err(e) => {
                        st.current = None;
                        return Some((Err(StorageError::IoError(e)), st));
                    }
                };

                let path = entry.path();
                let metadata = match entry.metadata().await {
                    Ok(metadata) => metadata,
                    Err(e) => return Some((Err(StorageError::IoError(e)), st)),
                };

                if metadata.is_dir() {
                    st.pending.push(path);
                    continue;
                }

                let is_temp = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.ends_with(TEMP_SUFFIX));
                if !metadata.is_file() || is_temp {
                    continue;
                }

                if let Some(key) = st.storage.path_to_key(&path) {
                    if key.as_str().starts_with(st.prefix) {
                        let meta = LocalStorage::file_meta(key, &metadata);
                        return Some((Ok(meta), st));
                    }
                }
            }
        })
        .boxed()
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures::TryStreamExt;
    use tempfile::tempdir;

    fn body(parts: &[&'static str]) -> ByteStream {
        let chunks: Vec<StorageResult<Bytes>> = parts
            .iter()
            .map(|p| Ok(Bytes::from_static(p.as_bytes())))
            .collect();
        Box::pin(stream::iter(chunks))
    }

    fn key(raw: &str) -> StorageKey {
        StorageKey::parse(raw).unwrap()
    }

    async fn read_all(storage: &LocalStorage, key: &StorageKey) -> Vec<u8> {
        let chunks: Vec<Bytes> = storage.read(key).await.unwrap().try_collect().await.unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn test_local_storage_create_read() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/storage".to_string())
            .await
            .unwrap();

        let k = key("2024/01/IMG_0001.jpg");
        let meta = storage
            .create(&k, body(&["hello ", "world"]), None, "image/jpeg")
            .await
            .unwrap();

        assert_eq!(meta.size, 11);
        assert_eq!(meta.content_type.as_deref(), Some("image/jpeg"));
        assert_eq!(read_all(&storage, &k).await, b"hello world");
        assert_eq!(storage.public_url(&k), "/storage/2024/01/IMG_0001.jpg");
    }

    #[tokio::test]
    async fn test_create_overwrites_existing() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/storage".to_string())
            .await
            .unwrap();

        let k = key("a.jpg");
        storage.create(&k, body(&["first"]), None, "image/jpeg").await.unwrap();
        storage.create(&k, body(&["second"]), None, "image/jpeg").await.unwrap();

        assert_eq!(read_all(&storage, &k).await, b"second");
    }

    #[tokio::test]
    async fn test_repeated_create_is_idempotent() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/storage".to_string())
            .await
            .unwrap();

        let k = key("2024/same.jpg");
        let first = storage.create(&k, body(&["abc"]), Some(3), "image/jpeg").await.unwrap();
        let meta_after_first = storage.meta(&k).await.unwrap();
        let second = storage.create(&k, body(&["abc"]), Some(3), "image/jpeg").await.unwrap();
        let meta_after_second = storage.meta(&k).await.unwrap();

        assert!(first.same_content_as(&second));
        assert!(meta_after_first.same_content_as(&meta_after_second));
        assert_eq!(read_all(&storage, &k).await, b"abc");
    }

    #[tokio::test]
    async fn test_failed_create_leaves_nothing_behind() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/storage".to_string())
            .await
            .unwrap();

        let failing: ByteStream = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(StorageError::UploadFailed("client went away".to_string())),
        ]));

        let k = key("broken/b.jpg");
        let result = storage.create(&k, failing, None, "image/jpeg").await;
        assert!(result.is_err());
        assert!(matches!(storage.meta(&k).await, Err(StorageError::NotFound(_))));

        let listed: Vec<_> = storage.list("").try_collect().await.unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/storage".to_string())
            .await
            .unwrap();

        assert!(matches!(
            storage.key_to_path("../../../etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            storage.key_to_path("/etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(storage.key_to_path("2024/a.jpg").await.is_ok());
    }

    #[tokio::test]
    async fn test_namespace_applied_to_every_operation() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/storage".to_string())
            .await
            .unwrap()
            .with_namespace("photos/");

        let k = key("2024/01/a.jpg");
        storage.create(&k, body(&["data"]), Some(4), "image/jpeg").await.unwrap();
        std::fs::create_dir_all(dir.path().join("other")).unwrap();
        std::fs::write(dir.path().join("other/outside.jpg"), b"x").unwrap();

        assert!(dir.path().join("photos/2024/01/a.jpg").is_file());
        assert!(!dir.path().join("2024").exists());
        assert_eq!(storage.public_url(&k), "/storage/photos/2024/01/a.jpg");
        assert_eq!(read_all(&storage, &k).await, b"data");
        assert_eq!(storage.meta(&k).await.unwrap().size, 4);

        let listed: Vec<String> = storage
            .list("")
            .map_ok(|m| m.key.into_string())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(listed, vec!["2024/01/a.jpg"]);

        let scoped: Vec<_> = storage.list("2024/0").try_collect().await.unwrap();
        assert_eq!(scoped.len(), 1);

        assert!(matches!(
            storage.key_to_path("../other/outside.jpg").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            storage.resolve("photos/../../etc").await,
            Err(StorageError::InvalidKey(_))
        ));

        storage.delete(&k).await.unwrap();
        assert!(!dir.path().join("photos/2024/01/a.jpg").exists());
        assert!(dir.path().join("other/outside.jpg").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_out_of_root_rejected() {
        let dir = tempdir().unwrap();
        let outside = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/storage".to_string())
            .await
            .unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("escape")).unwrap();

        let result = storage
            .create(&key("escape/a.jpg"), body(&["x"]), None, "image/jpeg")
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
        assert!(!outside.path().join("a.jpg").exists());
    }

    #[tokio::test]
    async fn test_local_storage_delete_nonexistent() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/storage".to_string())
            .await
            .unwrap();

        let result = storage.delete(&key("nonexistent/file.jpg")).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_meta_and_list() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "/storage/".to_string())
            .await
            .unwrap();

        for raw in ["2024/01/a.jpg", "2024/02/b.mov", "2023/c.png"] {
            storage
                .create(&key(raw), body(&["data"]), Some(4), "application/octet-stream")
                .await
                .unwrap();
        }

        // Type comes from the extension, not the type given to `create`.
        let meta = storage.meta(&key("2024/02/b.mov")).await.unwrap();
        assert_eq!(meta.size, 4);
        assert_eq!(meta.content_type.as_deref(), Some("video/quicktime"));
        assert!(meta.last_modified.is_some());

        let mut listed: Vec<String> = storage
            .list("2024/")
            .map_ok(|m| m.key.into_string())
            .try_collect()
            .await
            .unwrap();
        listed.sort();
        assert_eq!(listed, vec!["2024/01/a.jpg", "2024/02/b.mov"]);

        let all: Vec<_> = storage.list("").try_collect().await.unwrap();
        assert_eq!(all.len(), 3);

        storage.delete(&key("2023/c.png")).await.unwrap();
        assert!(matches!(
            storage.meta(&key("2023/c.png")).await,
            Err(StorageError::NotFound(_))
        ));
    }
}
