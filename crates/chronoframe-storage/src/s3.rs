use crate::keys::{guess_content_type, join_namespace, normalize_namespace, strip_namespace};
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use chronoframe_core::models::{StorageKey, StorageObjectMeta};
use futures::stream::BoxStream;
use futures::StreamExt;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, AttributeValue, Attributes, GetOptions, ObjectMeta, ObjectStore, ObjectStoreExt,
    PutMultipartOptions, PutOptions, PutPayload, PutResult, Result as ObjectResult,
    WriteMultipart,
};

/// Parts kept in flight while streaming a multipart upload.
const MULTIPART_MAX_CONCURRENCY: usize = 4;

/// Connection settings for an S3-compatible bucket.
#[derive(Clone, Debug)]
pub struct S3StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible providers (MinIO, R2, Spaces).
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Namespace prepended to every key inside the bucket.
    pub prefix: Option<String>,
    pub cdn_url: Option<String>,
    pub force_path_style: bool,
    /// Bodies larger than this use multipart upload.
    pub multipart_threshold: u64,
}

/// S3 storage implementation
#[derive(Clone)]
pub struct S3Storage {
    store: AmazonS3,
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
    prefix: String,
    cdn_url: Option<String>,
    force_path_style: bool,
    multipart_threshold: u64,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// Credentials not given explicitly fall back to the standard AWS
    /// environment variables.
    pub fn new(config: S3StorageConfig) -> StorageResult<Self> {
        let mut builder = AmazonS3Builder::from_env()
            .with_region(config.region.clone())
            .with_bucket_name(config.bucket.clone())
            .with_virtual_hosted_style_request(!config.force_path_style);

        if let Some(ref endpoint) = config.endpoint {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }
        if let Some(ref access_key_id) = config.access_key_id {
            builder = builder.with_access_key_id(access_key_id.clone());
        }
        if let Some(ref secret_access_key) = config.secret_access_key {
            builder = builder.with_secret_access_key(secret_access_key.clone());
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;

        Ok(S3Storage {
            store,
            bucket: config.bucket,
            region: config.region,
            endpoint_url: config.endpoint,
            prefix: config.prefix.as_deref().map(normalize_namespace).unwrap_or_default(),
            cdn_url: config.cdn_url,
            force_path_style: config.force_path_style,
            multipart_threshold: config.multipart_threshold,
        })
    }

    fn object_key(&self, key: &StorageKey) -> String {
        join_namespace(&self.prefix, key.as_str())
    }

    fn location(&self, key: &StorageKey) -> Path {
        Path::from(self.object_key(key))
    }

    fn attributes(content_type: &str) -> Attributes {
        let mut attributes = Attributes::new();
        attributes.insert(
            Attribute::ContentType,
            AttributeValue::from(content_type.to_string()),
        );
        attributes
    }

    /// Listings carry no content type, so it is guessed from the extension
    /// unless the caller already has the stored one.
    fn to_meta(&self, object: ObjectMeta, content_type: Option<String>) -> Option<StorageObjectMeta> {
        let relative = strip_namespace(&self.prefix, object.location.as_ref())?;
        let key = StorageKey::parse(relative).ok()?;
        let content_type = content_type.or_else(|| guess_content_type(key.as_str()));
        Some(StorageObjectMeta {
            key,
            size: object.size,
            content_type,
            etag: object.e_tag,
            last_modified: Some(object.last_modified),
        })
    }

    /// Single PUT for bodies that fit under the multipart threshold.
    async fn put_single(
        &self,
        location: &Path,
        chunks: Vec<Bytes>,
        content_type: &str,
    ) -> StorageResult<Option<String>> {
        let payload: PutPayload = chunks.into_iter().collect();
        let opts = PutOptions {
            attributes: Self::attributes(content_type),
            ..Default::default()
        };

        let result: ObjectResult<_> = self.store.put_opts(location, payload, opts).await;
        result
            .map(|r| r.e_tag)
            .map_err(|e| StorageError::UploadFailed(e.to_string()))
    }

    /// Multipart upload seeded with already-buffered chunks, then fed from the
    /// rest of the stream. Any failure aborts the upload so no object appears.
    async fn put_multipart(
        &self,
        location: &Path,
        buffered: Vec<Bytes>,
        mut rest: ByteStream,
        content_type: &str,
    ) -> StorageResult<(u64, Option<String>)> {
        let opts = PutMultipartOptions {
            attributes: Self::attributes(content_type),
            ..Default::default()
        };
        let upload = self
            .store
            .put_multipart_opts(location, opts)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        let mut writer = MultipartGuard::new(WriteMultipart::new(upload));
        let mut size = 0u64;

        for chunk in &buffered {
            size += chunk.len() as u64;
            writer.write(chunk);
        }

        while let Some(next) = rest.next().await {
            let chunk = match next {
                Ok(chunk) => chunk,
                Err(e) => {
                    writer.abort().await;
                    return Err(e);
                }
            };
            if let Err(e) = writer.wait_for_capacity(MULTIPART_MAX_CONCURRENCY).await {
                writer.abort().await;
                return Err(StorageError::UploadFailed(e.to_string()));
            }
            size += chunk.len() as u64;
            writer.write(&chunk);
        }

        let result = writer.finish().await?;

        Ok((size, result.e_tag))
    }
}

/// Owns an in-progress multipart upload and aborts it when dropped before
/// `finish`, including when the owning `create` future is cancelled.
struct MultipartGuard {
    writer: Option<WriteMultipart>,
}

impl MultipartGuard {
    fn new(writer: WriteMultipart) -> Self {
        Self {
            writer: Some(writer),
        }
    }

    fn write(&mut self, buf: &[u8]) {
        if let Some(writer) = self.writer.as_mut() {
            writer.write(buf);
        }
    }

    async fn wait_for_capacity(&mut self, max_concurrency: usize) -> ObjectResult<()> {
        match self.writer.as_mut() {
            Some(writer) => writer.wait_for_capacity(max_concurrency).await,
            None => Ok(()),
        }
    }

    async fn abort(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.abort().await {
                tracing::warn!(error = %e, "Failed to abort S3 multipart upload");
            }
        }
    }

    async fn finish(&mut self) -> StorageResult<PutResult> {
        let writer = self
            .writer
            .take()
            .ok_or_else(|| StorageError::UploadFailed("Multipart upload already closed".to_string()))?;
        writer
            .finish()
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))
    }
}

impl Drop for MultipartGuard {
    fn drop(&mut self) {
        let Some(writer) = self.writer.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = writer.abort().await {
                        tracing::warn!(error = %e, "Failed to abort abandoned S3 multipart upload");
                    }
                });
            }
            Err(_) => {
                tracing::warn!("S3 multipart upload abandoned without a runtime to abort it");
            }
        }
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn create(
        &self,
        key: &StorageKey,
        mut data: ByteStream,
        content_length: Option<u64>,
        content_type: &str,
    ) -> StorageResult<StorageObjectMeta> {
        let object_key = self.object_key(key);
        let location = Path::from(object_key.clone());
        let start = std::time::Instant::now();

        // Buffer up to the threshold; a body that outgrows it switches to multipart.
        let mut buffered = Vec::new();
        let mut buffered_size = 0u64;
        let mut overflowed = content_length.is_some_and(|len| len > self.multipart_threshold);
        while !overflowed {
            match data.next().await {
                Some(chunk) => {
                    let chunk = chunk?;
                    buffered_size += chunk.len() as u64;
                    buffered.push(chunk);
                    overflowed = buffered_size > self.multipart_threshold;
                }
                None => break,
            }
        }

        let result = if overflowed {
            self.put_multipart(&location, buffered, data, content_type)
                .await
        } else {
            self.put_single(&location, buffered, content_type)
                .await
                .map(|etag| (buffered_size, etag))
        };

        let (size, etag) = result.map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %self.bucket,
                key = %object_key,
                multipart = overflowed,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 upload failed"
            );
            e
        })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %object_key,
            size_bytes = size,
            multipart = overflowed,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 upload successful"
        );

        Ok(StorageObjectMeta {
            key: key.clone(),
            size,
            content_type: Some(content_type.to_string()),
            etag,
            last_modified: None,
        })
    }

    async fn read(&self, key: &StorageKey) -> StorageResult<ByteStream> {
        let location = self.location(key);

        let result: ObjectResult<_> = self.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(key.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %self.bucket,
                    key = %key,
                    "S3 download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let stream = result
            .into_stream()
            .map(|res| res.map_err(|e| StorageError::DownloadFailed(e.to_string())));

        Ok(Box::pin(stream))
    }

    async fn delete(&self, key: &StorageKey) -> StorageResult<()> {
        let location = self.location(key);

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {
                tracing::info!(bucket = %self.bucket, key = %key, "S3 delete successful");
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    "S3 delete failed"
                );
                Err(StorageError::DeleteFailed(e.to_string()))
            }
        }
    }

    async fn meta(&self, key: &StorageKey) -> StorageResult<StorageObjectMeta> {
        let location = self.location(key);
        let options = GetOptions {
            head: true,
            ..Default::default()
        };
        match self.store.get_opts(&location, options).await {
            Ok(result) => {
                let content_type = result
                    .attributes
                    .get(&Attribute::ContentType)
                    .map(|value| value.to_string());
                self.to_meta(result.meta, content_type).ok_or_else(|| {
                    StorageError::BackendError(format!("Unexpected object path for {}", key))
                })
            }
            Err(ObjectStoreError::NotFound { .. }) => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    /// CDN first, then the configured endpoint (path-style or virtual-hosted),
    /// then the standard AWS URL.
    fn public_url(&self, key: &StorageKey) -> String {
        let object_key = self.object_key(key);

        if let Some(ref cdn) = self.cdn_url {
            return format!("{}/{}", cdn.trim_end_matches('/'), object_key);
        }

        match self.endpoint_url {
            Some(ref endpoint) => {
                let base_url = endpoint.trim_end_matches('/');
                if self.force_path_style {
                    format!("{}/{}/{}", base_url, self.bucket, object_key)
                } else {
                    match base_url.split_once("://") {
                        Some((scheme, host)) => {
                            format!("{}://{}.{}/{}", scheme, self.bucket, host, object_key)
                        }
                        None => format!("https://{}.{}/{}", self.bucket, base_url, object_key),
                    }
                }
            }
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket, self.region, object_key
            ),
        }
    }

    /// Lists the deepest directory named by `prefix` and filters by plain
    /// string prefix, so "2024/0" matches "2024/01/a.jpg" and "2024" matches
    /// "20245/b.jpg" as on the other backends.
    fn list<'a>(&'a self, prefix: &'a str) -> BoxStream<'a, StorageResult<StorageObjectMeta>> {
        let prefix = prefix.trim_start_matches('/');
        let dir_part = prefix.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("");
        let dir = join_namespace(&self.prefix, dir_part)
            .trim_end_matches('/')
            .to_string();
        let location = (!dir.is_empty()).then(|| Path::from(dir));

        self.store
            .list(location.as_ref())
            .filter_map(move |res| {
                let item = match res {
                    Ok(object) => self
                        .to_meta(object, None)
                        .filter(|meta| meta.key.as_str().starts_with(prefix))
                        .map(Ok),
                    Err(e) => Some(Err(StorageError::BackendError(e.to_string()))),
                };
                futures::future::ready(item)
            })
            .boxed()
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}
