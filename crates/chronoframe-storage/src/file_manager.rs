//! Remote file-manager backend (OpenList/AList-style HTTP API).
//!
//! Every JSON response is wrapped in a `{code, message, data}` envelope where
//! `code == 200` means success regardless of the HTTP status. Uploads are a raw
//! `PUT` with the destination in a percent-encoded `File-Path` header; list,
//! meta and delete are JSON `POST`s.

use crate::keys::{guess_content_type, join_namespace, normalize_namespace};
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronoframe_core::models::{StorageKey, StorageObjectMeta};
use chronoframe_core::FileManagerEndpoints;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

/// Characters left unescaped in a single path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Same as [`PATH_SEGMENT`] but keeps separators.
const FULL_PATH: &AsciiSet = &PATH_SEGMENT.remove(b'/');

const SUCCESS_CODE: i64 = 200;

/// Connection settings for the remote file manager.
#[derive(Clone, Debug)]
pub struct FileManagerConfig {
    pub base_url: String,
    /// Directory on the remote side all keys live under.
    pub root_path: String,
    pub token: String,
    pub endpoints: FileManagerEndpoints,
    /// JSON field carrying the target path in list/meta requests.
    pub path_field: String,
    pub cdn_url: Option<String>,
    pub timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct RemoteObject {
    name: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    is_dir: bool,
    #[serde(default)]
    modified: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteListing {
    #[serde(default)]
    content: Option<Vec<RemoteObject>>,
}

fn is_not_found(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("not found") || message.contains("not exist")
}

fn parse_modified(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Remote file manager storage implementation
#[derive(Clone)]
pub struct FileManagerStorage {
    client: Client,
    base_url: String,
    root: String,
    token: String,
    endpoints: FileManagerEndpoints,
    path_field: String,
    cdn_url: Option<String>,
}

impl FileManagerStorage {
    pub fn new(config: FileManagerConfig) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::ConfigError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            root: normalize_namespace(&config.root_path),
            token: config.token,
            endpoints: config.endpoints,
            path_field: config.path_field,
            cdn_url: config.cdn_url,
        })
    }

    fn build_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Absolute remote path for a key-relative path: `/{root}/{relative}`.
    fn remote_path(&self, relative: &str) -> String {
        let joined = join_namespace(&self.root, relative.trim_matches('/'));
        format!("/{}", joined.trim_end_matches('/'))
    }

    fn path_body(&self, path: &str) -> Map<String, Value> {
        let mut body = Map::new();
        body.insert(self.path_field.clone(), Value::String(path.to_string()));
        body
    }

    /// POST a JSON body and unwrap the envelope.
    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Value,
    ) -> StorageResult<Envelope<T>> {
        let url = self.build_url(endpoint);
        let response = self
            .client
            .post(&url)
            .header("Authorization", &self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::BackendError(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(StorageError::BackendError(format!(
                "Request to {} failed with status {}: {}",
                url, status, error_text
            )));
        }

        response
            .json::<Envelope<T>>()
            .await
            .map_err(|e| StorageError::BackendError(format!("Invalid response from {}: {}", url, e)))
    }

    fn to_meta(&self, key: StorageKey, object: &RemoteObject) -> StorageObjectMeta {
        let content_type = guess_content_type(key.as_str());
        StorageObjectMeta {
            key,
            size: object.size,
            content_type,
            etag: None,
            last_modified: parse_modified(object.modified.as_deref()),
        }
    }

    async fn list_dir(&self, dir: &str) -> StorageResult<Vec<RemoteObject>> {
        let mut body = self.path_body(&self.remote_path(dir));
        body.insert("page".to_string(), json!(1));
        body.insert("per_page".to_string(), json!(0));
        body.insert("refresh".to_string(), json!(false));

        let envelope: Envelope<RemoteListing> =
            self.call(&self.endpoints.list, Value::Object(body)).await?;

        match envelope.code {
            SUCCESS_CODE => Ok(envelope
                .data
                .and_then(|listing| listing.content)
                .unwrap_or_default()),
            _ if is_not_found(&envelope.message) => Ok(Vec::new()),
            code => Err(StorageError::BackendError(format!(
                "List failed ({}): {}",
                code, envelope.message
            ))),
        }
    }
}

struct ListState<'a> {
    storage: &'a FileManagerStorage,
    prefix: &'a str,
    pending: Vec<String>,
    ready: Vec<StorageObjectMeta>,
}

#[async_trait]
impl Storage for FileManagerStorage {
    async fn create(
        &self,
        key: &StorageKey,
        data: ByteStream,
        content_length: Option<u64>,
        content_type: &str,
    ) -> StorageResult<StorageObjectMeta> {
        let remote_path = self.remote_path(key.as_str());
        let url = self.build_url(&self.endpoints.upload);
        let start = std::time::Instant::now();

        let mut request = self
            .client
            .put(&url)
            .header("Authorization", &self.token)
            .header(
                "File-Path",
                utf8_percent_encode(&remote_path, FULL_PATH).to_string(),
            )
            .header("Content-Type", content_type);
        if let Some(len) = content_length {
            request = request.header("Content-Length", len);
        }

        let response = request
            .body(reqwest::Body::wrap_stream(data))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    path = %remote_path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "File manager upload failed"
                );
                StorageError::UploadFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::UploadFailed(format!(
                "Upload rejected with status {}",
                status
            )));
        }

        let envelope: Envelope<Value> = response
            .json()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Invalid upload response: {}", e)))?;
        if envelope.code != SUCCESS_CODE {
            tracing::error!(
                code = envelope.code,
                message = %envelope.message,
                path = %remote_path,
                "File manager rejected upload"
            );
            return Err(StorageError::UploadFailed(envelope.message));
        }

        tracing::info!(
            path = %remote_path,
            key = %key,
            size_bytes = content_length,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "File manager upload successful"
        );

        Ok(StorageObjectMeta {
            key: key.clone(),
            size: content_length.unwrap_or_default(),
            content_type: Some(content_type.to_string()),
            etag: None,
            last_modified: Some(Utc::now()),
        })
    }

    async fn read(&self, key: &StorageKey) -> StorageResult<ByteStream> {
        let remote_path = self.remote_path(key.as_str());
        let url = format!(
            "{}{}",
            self.build_url(&self.endpoints.download),
            utf8_percent_encode(&remote_path, FULL_PATH)
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", &self.token)
            .send()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(key.to_string())),
            status if !status.is_success() => Err(StorageError::DownloadFailed(format!(
                "Download failed with status {}",
                status
            ))),
            _ => {
                let stream = response
                    .bytes_stream()
                    .map(|res| res.map_err(|e| StorageError::DownloadFailed(e.to_string())));
                Ok(Box::pin(stream))
            }
        }
    }

    async fn delete(&self, key: &StorageKey) -> StorageResult<()> {
        let remote_path = self.remote_path(key.as_str());
        let (dir, name) = remote_path
            .rsplit_once('/')
            .map(|(dir, name)| (if dir.is_empty() { "/" } else { dir }, name))
            .unwrap_or(("/", remote_path.as_str()));

        let envelope: Envelope<Value> = self
            .call(
                &self.endpoints.delete,
                json!({ "dir": dir, "names": [name] }),
            )
            .await
            .map_err(|e| StorageError::DeleteFailed(e.to_string()))?;

        match envelope.code {
            SUCCESS_CODE => {
                tracing::info!(path = %remote_path, key = %key, "File manager delete successful");
                Ok(())
            }
            _ if is_not_found(&envelope.message) => Ok(()),
            _ => Err(StorageError::DeleteFailed(envelope.message)),
        }
    }

    async fn meta(&self, key: &StorageKey) -> StorageResult<StorageObjectMeta> {
        let body = self.path_body(&self.remote_path(key.as_str()));
        let envelope: Envelope<RemoteObject> =
            self.call(&self.endpoints.meta, Value::Object(body)).await?;

        match (envelope.code, envelope.data) {
            (SUCCESS_CODE, Some(object)) if !object.is_dir => Ok(self.to_meta(key.clone(), &object)),
            (SUCCESS_CODE, _) => Err(StorageError::NotFound(key.to_string())),
            (_, _) if is_not_found(&envelope.message) => Err(StorageError::NotFound(key.to_string())),
            (code, _) => Err(StorageError::BackendError(format!(
                "Meta failed ({}): {}",
                code, envelope.message
            ))),
        }
    }

    fn public_url(&self, key: &StorageKey) -> String {
        match self.cdn_url {
            Some(ref cdn) => format!(
                "{}/{}",
                cdn.trim_end_matches('/'),
                utf8_percent_encode(key.as_str(), FULL_PATH)
            ),
            None => format!(
                "{}{}",
                self.build_url(&self.endpoints.download),
                utf8_percent_encode(&self.remote_path(key.as_str()), FULL_PATH)
            ),
        }
    }

    fn list<'a>(&'a self, prefix: &'a str) -> BoxStream<'a, StorageResult<StorageObjectMeta>> {
        let prefix = prefix.trim_start_matches('/');
        let start_dir = prefix
            .rsplit_once('/')
            .map(|(dir, _)| dir.to_string())
            .unwrap_or_default();

        let state = ListState {
            storage: self,
            prefix,
            pending: vec![start_dir],
            ready: Vec::new(),
        };

        stream::unfold(state, |mut st| async move {
            loop {
                if let Some(meta) = st.ready.pop() {
                    return Some((Ok(meta), st));
                }

                let dir = st.pending.pop()?;
                let entries = match st.storage.list_dir(&dir).await {
                    Ok(entries) => entries,
                    Err(e) => return Some((Err(e), st)),
                };

                for entry in entries {
                    let relative = join_namespace(&dir, &entry.name);
                    if entry.is_dir {
                        let dir_prefix = format!("{}/", relative);
                        if dir_prefix.starts_with(st.prefix) || st.prefix.starts_with(&dir_prefix) {
                            st.pending.push(relative);
                        }
                        continue;
                    }
                    if !relative.starts_with(st.prefix) {
                        continue;
                    }
                    if let Ok(key) = StorageKey::parse(&relative) {
                        let meta = st.storage.to_meta(key, &entry);
                        st.ready.push(meta);
                    }
                }
            }
        })
        .boxed()
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::FileManager
    }
}
