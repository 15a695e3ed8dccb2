//! Error types module
//!
//! `AppError` is the HTTP-facing error every lower layer converts into. Each
//! variant describes itself through `ErrorMetadata` so the API layer can render
//! a `{title, message, suggestion, code}` body without matching on variants.
//!
//! The `Database` variant wraps `sqlx::Error` only with the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like rejected uploads
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "PAYLOAD_TOO_LARGE")
    fn error_code(&self) -> &'static str;

    /// Short human-readable heading
    fn title(&self) -> &'static str;

    /// Suggested action for the client
    fn suggestion(&self) -> Option<String>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Unsupported media type: {content_type}")]
    UnsupportedMediaType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("File too large: {size} bytes exceeds {max} bytes")]
    PayloadTooLarge { size: u64, max: u64 },

    #[error("Duplicate content already stored at {existing_key}")]
    DuplicateContent { existing_key: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(format!("JSON parsing error: {}", err))
    }
}

fn megabytes(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / 1024.0 / 1024.0)
}

/// Static metadata for each variant: (http_status, error_code, title, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (u16, &'static str, &'static str, bool, LogLevel) {
    match err {
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            "Unauthorized",
            false,
            LogLevel::Debug,
        ),
        AppError::MissingField(_) => (
            400,
            "MISSING_FIELD",
            "Missing required field",
            false,
            LogLevel::Debug,
        ),
        AppError::BadRequest(_) => (
            400,
            "BAD_REQUEST",
            "Bad request",
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidKey(_) => (
            400,
            "INVALID_KEY",
            "Invalid storage key",
            false,
            LogLevel::Debug,
        ),
        AppError::UnsupportedMediaType { .. } => (
            415,
            "UNSUPPORTED_MEDIA_TYPE",
            "Unsupported file type",
            false,
            LogLevel::Warn,
        ),
        AppError::PayloadTooLarge { .. } => (
            413,
            "PAYLOAD_TOO_LARGE",
            "File too large",
            false,
            LogLevel::Debug,
        ),
        AppError::DuplicateContent { .. } => (
            409,
            "DUPLICATE_CONTENT",
            "Duplicate file",
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            "Not found",
            false,
            LogLevel::Debug,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            "Storage error",
            true,
            LogLevel::Error,
        ),
        AppError::UploadFailed(_) => (
            500,
            "UPLOAD_FAILED",
            "Upload failed",
            true,
            LogLevel::Error,
        ),
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            "Database error",
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            "Internal server error",
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::MissingField(_) => "MissingField",
            AppError::BadRequest(_) => "BadRequest",
            AppError::InvalidKey(_) => "InvalidKey",
            AppError::UnsupportedMediaType { .. } => "UnsupportedMediaType",
            AppError::PayloadTooLarge { .. } => "PayloadTooLarge",
            AppError::DuplicateContent { .. } => "DuplicateContent",
            AppError::NotFound(_) => "NotFound",
            AppError::Storage(_) => "Storage",
            AppError::UploadFailed(_) => "UploadFailed",
            AppError::Database(_) => "Database",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn title(&self) -> &'static str {
        app_error_static_metadata(self).2
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).3
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).4
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            AppError::Unauthorized(_) => Some("Sign in and try again".to_string()),
            AppError::UnsupportedMediaType { allowed, .. } => {
                Some(format!("Allowed types: {}", allowed.join(", ")))
            }
            AppError::PayloadTooLarge { max, .. } => {
                Some(format!("Maximum file size is {} MB", max / 1024 / 1024))
            }
            AppError::DuplicateContent { existing_key } => {
                Some(format!("The same file already exists at {}", existing_key))
            }
            AppError::Storage(_) | AppError::UploadFailed(_) => {
                Some("Retry after a short delay".to_string())
            }
            _ => None,
        }
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Unauthorized(_) => "Authentication required".to_string(),
            AppError::MissingField(field) => format!("The '{}' field is required", field),
            AppError::BadRequest(ref msg) => msg.clone(),
            AppError::InvalidKey(ref msg) => msg.clone(),
            AppError::UnsupportedMediaType { content_type, .. } => {
                format!("File type {} is not allowed", content_type)
            }
            AppError::PayloadTooLarge { size, .. } => {
                format!("File size {} MB exceeds the upload limit", megabytes(*size))
            }
            AppError::DuplicateContent { .. } => "This file has already been uploaded".to_string(),
            AppError::NotFound(ref msg) => msg.clone(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::UploadFailed(_) => "The file could not be saved".to_string(),
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::MissingField("key").http_status_code(), 400);
        assert_eq!(AppError::Unauthorized("no session".into()).http_status_code(), 401);
        assert_eq!(
            AppError::UnsupportedMediaType {
                content_type: "image/x-foo".into(),
                allowed: vec!["image/jpeg".into()],
            }
            .http_status_code(),
            415
        );
        assert_eq!(
            AppError::PayloadTooLarge { size: 1, max: 0 }.http_status_code(),
            413
        );
        assert_eq!(AppError::UploadFailed("boom".into()).http_status_code(), 500);
    }

    #[test]
    fn test_unsupported_media_type_lists_allowed() {
        let err = AppError::UnsupportedMediaType {
            content_type: "image/x-foo".into(),
            allowed: vec!["image/jpeg".into(), "video/quicktime".into()],
        };
        assert_eq!(err.client_message(), "File type image/x-foo is not allowed");
        assert_eq!(
            err.suggestion().as_deref(),
            Some("Allowed types: image/jpeg, video/quicktime")
        );
    }

    #[test]
    fn test_payload_too_large_reports_megabytes() {
        let err = AppError::PayloadTooLarge {
            size: 200 * 1024 * 1024,
            max: 128 * 1024 * 1024,
        };
        assert_eq!(err.client_message(), "File size 200.00 MB exceeds the upload limit");
        assert_eq!(err.suggestion().as_deref(), Some("Maximum file size is 128 MB"));
    }

    #[test]
    fn test_internal_errors_are_sensitive() {
        let err: AppError = anyhow::anyhow!("disk exploded").into();
        assert!(err.is_sensitive());
        assert_eq!(err.client_message(), "Internal server error");
        assert!(err.detailed_message().contains("disk exploded"));
    }
}
