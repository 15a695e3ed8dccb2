//! Configuration module
//!
//! Process-wide configuration, read once from the environment at startup and
//! passed explicitly (as `Arc<Config>`) into the storage factory and the upload
//! pipeline. Nothing in core logic reads the environment after this point.

use std::env;

use crate::constants::{
    DEFAULT_MAX_UPLOAD_MB, DEFAULT_S3_MULTIPART_THRESHOLD_MB, DEFAULT_SESSION_COOKIE_NAME,
    DEFAULT_SPOOL_MEMORY_MB,
};
use crate::models::{DuplicateMode, DuplicatePolicy};
use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 3000;
const MIN_SESSION_SECRET_LEN: usize = 32;
const FILE_MANAGER_TIMEOUT_SECS: u64 = 60;

/// Server, session, and metadata-store settings.
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    pub session_secret: String,
    pub session_cookie_name: String,
    /// SQLite URL for the photo index; `None` keeps the index in memory.
    pub database_url: Option<String>,
}

/// Remote file-manager endpoint map (paths relative to the base URL).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileManagerEndpoints {
    pub upload: String,
    pub download: String,
    pub list: String,
    pub delete: String,
    pub meta: String,
}

impl Default for FileManagerEndpoints {
    fn default() -> Self {
        Self {
            upload: "/api/fs/put".to_string(),
            download: "/d".to_string(),
            list: "/api/fs/list".to_string(),
            delete: "/api/fs/remove".to_string(),
            meta: "/api/fs/get".to_string(),
        }
    }
}

/// Storage provider selection and per-provider connection parameters.
///
/// Provider fields are optional here; the storage factory checks that the
/// selected provider has what it needs and fails the process otherwise.
#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub provider: StorageBackend,
    // S3-compatible object storage
    pub s3_endpoint: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_access_key_id: Option<String>,
    pub s3_secret_access_key: Option<String>,
    pub s3_prefix: Option<String>,
    pub s3_cdn_url: Option<String>,
    pub s3_force_path_style: bool,
    pub s3_multipart_threshold_bytes: u64,
    // Local filesystem
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: String,
    /// Subdirectory of the storage path all keys live under.
    pub local_storage_prefix: Option<String>,
    // Remote file manager (OpenList/AList-style API)
    pub file_manager_base_url: Option<String>,
    pub file_manager_root_path: String,
    pub file_manager_token: Option<String>,
    pub file_manager_endpoints: FileManagerEndpoints,
    pub file_manager_path_field: String,
    pub file_manager_cdn_url: Option<String>,
    pub file_manager_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: StorageBackend::Local,
            s3_endpoint: None,
            s3_bucket: None,
            s3_region: "auto".to_string(),
            s3_access_key_id: None,
            s3_secret_access_key: None,
            s3_prefix: None,
            s3_cdn_url: None,
            s3_force_path_style: true,
            s3_multipart_threshold_bytes: DEFAULT_S3_MULTIPART_THRESHOLD_MB * 1024 * 1024,
            local_storage_path: None,
            local_storage_base_url: "/storage".to_string(),
            local_storage_prefix: None,
            file_manager_base_url: None,
            file_manager_root_path: "/".to_string(),
            file_manager_token: None,
            file_manager_endpoints: FileManagerEndpoints::default(),
            file_manager_path_field: "path".to_string(),
            file_manager_cdn_url: None,
            file_manager_timeout_secs: FILE_MANAGER_TIMEOUT_SECS,
        }
    }
}

/// Upload policy settings.
#[derive(Clone, Debug)]
pub struct UploadConfig {
    pub max_payload_bytes: u64,
    pub mime_whitelist_enabled: bool,
    /// Raw comma-separated allow-list, parsed once by the policy.
    pub mime_whitelist: String,
    pub duplicate_check: DuplicatePolicy,
    pub serialize_same_key: bool,
    pub spool_memory_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            mime_whitelist_enabled: false,
            mime_whitelist: String::new(),
            duplicate_check: DuplicatePolicy::default(),
            serialize_same_key: false,
            spool_memory_bytes: DEFAULT_SPOOL_MEMORY_MB * 1024 * 1024,
        }
    }
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, anyhow::Error> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!("{} must be true or false, got '{}'", name, raw)),
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub base: BaseConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let flag = |name: &str, default: bool| -> Result<bool, anyhow::Error> {
            match var(name) {
                Some(raw) => parse_flag(name, &raw),
                None => Ok(default),
            }
        };
        let number = |name: &str, default: u64| -> Result<u64, anyhow::Error> {
            match var(name) {
                Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                    anyhow::anyhow!("{} must be a non-negative whole number, got '{}'", name, raw)
                }),
                None => Ok(default),
            }
        };
        let megabytes = |name: &str, default: u64| -> Result<u64, anyhow::Error> {
            number(name, default)?
                .checked_mul(1024 * 1024)
                .ok_or_else(|| anyhow::anyhow!("{} is too large", name))
        };

        let base = BaseConfig {
            server_port: var("PORT")
                .unwrap_or_else(|| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment: var("ENVIRONMENT")
                .or_else(|| var("APP_ENV"))
                .unwrap_or_else(|| "development".to_string()),
            session_secret: var("SESSION_SECRET")
                .ok_or_else(|| anyhow::anyhow!("SESSION_SECRET must be set for authentication"))?,
            session_cookie_name: var("SESSION_COOKIE_NAME")
                .unwrap_or_else(|| DEFAULT_SESSION_COOKIE_NAME.to_string()),
            database_url: var("DATABASE_URL"),
        };

        let provider = match var("STORAGE_PROVIDER") {
            Some(raw) => raw.parse::<StorageBackend>()?,
            None => StorageBackend::Local,
        };

        let defaults = StorageConfig::default();
        let endpoints = FileManagerEndpoints::default();
        let storage = StorageConfig {
            provider,
            s3_endpoint: var("S3_ENDPOINT"),
            s3_bucket: var("S3_BUCKET"),
            s3_region: var("S3_REGION").unwrap_or(defaults.s3_region),
            s3_access_key_id: var("S3_ACCESS_KEY_ID"),
            s3_secret_access_key: var("S3_SECRET_ACCESS_KEY"),
            s3_prefix: var("S3_PREFIX"),
            s3_cdn_url: var("S3_CDN_URL"),
            s3_force_path_style: flag("S3_FORCE_PATH_STYLE", defaults.s3_force_path_style)?,
            s3_multipart_threshold_bytes: megabytes(
                "S3_MULTIPART_THRESHOLD_MB",
                DEFAULT_S3_MULTIPART_THRESHOLD_MB,
            )?,
            local_storage_path: var("LOCAL_STORAGE_PATH"),
            local_storage_base_url: var("LOCAL_STORAGE_BASE_URL")
                .unwrap_or(defaults.local_storage_base_url),
            local_storage_prefix: var("LOCAL_STORAGE_PREFIX"),
            file_manager_base_url: var("OPENLIST_BASE_URL"),
            file_manager_root_path: var("OPENLIST_ROOT_PATH")
                .unwrap_or(defaults.file_manager_root_path),
            file_manager_token: var("OPENLIST_TOKEN"),
            file_manager_endpoints: FileManagerEndpoints {
                upload: var("OPENLIST_UPLOAD_ENDPOINT").unwrap_or(endpoints.upload),
                download: var("OPENLIST_DOWNLOAD_ENDPOINT").unwrap_or(endpoints.download),
                list: var("OPENLIST_LIST_ENDPOINT").unwrap_or(endpoints.list),
                delete: var("OPENLIST_DELETE_ENDPOINT").unwrap_or(endpoints.delete),
                meta: var("OPENLIST_META_ENDPOINT").unwrap_or(endpoints.meta),
            },
            file_manager_path_field: var("OPENLIST_PATH_FIELD")
                .unwrap_or(defaults.file_manager_path_field),
            file_manager_cdn_url: var("OPENLIST_CDN_URL"),
            file_manager_timeout_secs: number("OPENLIST_TIMEOUT_SECS", FILE_MANAGER_TIMEOUT_SECS)?,
        };

        let duplicate_mode = match var("UPLOAD_DUPLICATE_CHECK_MODE") {
            Some(raw) => raw.parse::<DuplicateMode>()?,
            None => DuplicateMode::Skip,
        };

        let upload = UploadConfig {
            max_payload_bytes: megabytes("UPLOAD_MAX_SIZE_MB", DEFAULT_MAX_UPLOAD_MB)?,
            mime_whitelist_enabled: flag("UPLOAD_MIME_WHITELIST_ENABLED", false)?,
            mime_whitelist: var("UPLOAD_MIME_WHITELIST").unwrap_or_default(),
            duplicate_check: DuplicatePolicy {
                enabled: flag("UPLOAD_DUPLICATE_CHECK_ENABLED", false)?,
                mode: duplicate_mode,
            },
            serialize_same_key: flag("UPLOAD_SERIALIZE_SAME_KEY", false)?,
            spool_memory_bytes: megabytes("UPLOAD_SPOOL_MEMORY_MB", DEFAULT_SPOOL_MEMORY_MB)?,
        };

        let config = Config {
            base,
            storage,
            upload,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(anyhow::anyhow!(
                "SESSION_SECRET must be at least {} characters long",
                MIN_SESSION_SECRET_LEN
            ));
        }

        if self.upload.max_payload_bytes == 0 {
            return Err(anyhow::anyhow!("UPLOAD_MAX_SIZE_MB must be greater than 0"));
        }

        if let Some(ref url) = self.base.database_url {
            if !url.starts_with("sqlite:") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a SQLite connection string (sqlite:...)"
                ));
            }
        }

        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn server_port(&self) -> u16 {
        self.base.server_port
    }

    pub fn storage_provider(&self) -> StorageBackend {
        self.storage.provider
    }
}
