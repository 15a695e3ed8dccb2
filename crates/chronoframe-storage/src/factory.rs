use crate::{
    FileManagerConfig, FileManagerStorage, LocalStorage, S3Storage, S3StorageConfig, Storage,
    StorageBackend, StorageError, StorageResult,
};
use chronoframe_core::StorageConfig;
use std::sync::Arc;
use std::time::Duration;

fn required(value: &Option<String>, name: &str) -> StorageResult<String> {
    value
        .clone()
        .ok_or_else(|| StorageError::ConfigError(format!("{} not configured", name)))
}

/// Create a storage backend based on configuration
///
/// Fails when the selected provider is missing a required setting; the caller
/// is expected to abort startup on error.
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    let storage: Arc<dyn Storage> = match config.provider {
        StorageBackend::S3 => {
            let storage = S3Storage::new(S3StorageConfig {
                bucket: required(&config.s3_bucket, "S3_BUCKET")?,
                region: config.s3_region.clone(),
                endpoint: Some(required(&config.s3_endpoint, "S3_ENDPOINT")?),
                access_key_id: config.s3_access_key_id.clone(),
                secret_access_key: config.s3_secret_access_key.clone(),
                prefix: config.s3_prefix.clone(),
                cdn_url: config.s3_cdn_url.clone(),
                force_path_style: config.s3_force_path_style,
                multipart_threshold: config.s3_multipart_threshold_bytes,
            })?;
            Arc::new(storage)
        }

        StorageBackend::Local => {
            let base_path = required(&config.local_storage_path, "LOCAL_STORAGE_PATH")?;
            let storage = LocalStorage::new(base_path, config.local_storage_base_url.clone())
                .await?
                .with_namespace(config.local_storage_prefix.as_deref().unwrap_or_default());
            Arc::new(storage)
        }

        StorageBackend::FileManager => {
            let storage = FileManagerStorage::new(FileManagerConfig {
                base_url: required(&config.file_manager_base_url, "OPENLIST_BASE_URL")?,
                root_path: config.file_manager_root_path.clone(),
                token: required(&config.file_manager_token, "OPENLIST_TOKEN")?,
                endpoints: config.file_manager_endpoints.clone(),
                path_field: config.file_manager_path_field.clone(),
                cdn_url: config.file_manager_cdn_url.clone(),
                timeout: Duration::from_secs(config.file_manager_timeout_secs),
            })?;
            Arc::new(storage)
        }
    };

    tracing::info!(provider = %config.provider, "Storage provider initialized");

    Ok(storage)
}
