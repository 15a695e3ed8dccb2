//! Chronoframe Core Library
//!
//! Domain models, error types, and configuration shared by the storage layer,
//! the ingestion pipeline, and the HTTP server.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, FileManagerEndpoints, StorageConfig, UploadConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
// Storage, StorageError, StorageResult live in chronoframe-storage
