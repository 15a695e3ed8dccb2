//! Chronoframe Storage Library
//!
//! Storage abstraction for the photo library: the `Storage` trait and its
//! S3-compatible, local filesystem, and remote file-manager implementations.
//!
//! # Storage key format
//!
//! Keys are `StorageKey` values: slash-separated relative paths with no
//! leading `/` and no `..` segment. Each backend places them under its own
//! namespace (bucket prefix, base directory, remote root path); namespace
//! handling is centralized in the `keys` module so `list` output round-trips
//! through `create`.

pub mod factory;
pub mod file_manager;
pub(crate) mod keys;
pub mod local;
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use chronoframe_core::StorageBackend;
pub use factory::create_storage;
pub use file_manager::{FileManagerConfig, FileManagerStorage};
pub use local::LocalStorage;
pub use s3::{S3Storage, S3StorageConfig};
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
