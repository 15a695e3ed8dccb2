//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`. Lower layers convert
//! into `AppError` (or straight into `HttpAppError`), which renders the status and
//! the `{title, message, suggestion, code}` body from `ErrorMetadata`. Details are
//! only rendered once a handler has bound the error to a non-production config.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chronoframe_core::{AppError, Config, ErrorMetadata, LogLevel};
use chronoframe_processing::UploadError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
/// This is necessary because of Rust's orphan rules - we can't implement
/// IntoResponse (external trait) for AppError (external type from chronoframe-core)
#[derive(Debug)]
pub struct HttpAppError {
    error: AppError,
    expose_details: bool,
}

impl HttpAppError {
    /// Render details unless `config` is a production config.
    pub fn for_config(mut self, config: &Config) -> Self {
        self.expose_details = !config.is_production();
        self
    }

    pub fn error(&self) -> &AppError {
        &self.error
    }
}

impl From<AppError> for HttpAppError {
    fn from(error: AppError) -> Self {
        HttpAppError {
            error,
            expose_details: false,
        }
    }
}

impl From<anyhow::Error> for HttpAppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::from(err).into()
    }
}

impl From<UploadError> for HttpAppError {
    fn from(err: UploadError) -> Self {
        if let UploadError::StorageWriteFailed(ref source) = err {
            tracing::error!(error = %source, "Upload could not be written to storage");
        }
        AppError::from(err).into()
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error.detailed_message(), error_type = error_type, "Error occurred");
        }
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.error;

        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        // Sensitive errors never carry details.
        let details = (self.expose_details && !app_error.is_sensitive())
            .then(|| app_error.detailed_message());

        let body = Json(ErrorResponse {
            title: app_error.title().to_string(),
            message: app_error.client_message(),
            suggestion: app_error.suggestion(),
            code: app_error.error_code().to_string(),
            details,
        });

        (status, body).into_response()
    }
}
