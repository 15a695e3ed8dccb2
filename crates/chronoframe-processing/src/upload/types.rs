//! Request, outcome, and error types of the upload pipeline.

use bytes::Bytes;
use chronoframe_core::models::{KeyError, StorageKey, StorageObjectMeta, UserRef};
use chronoframe_core::AppError;
use chronoframe_storage::StorageError;
use futures::Stream;
use std::pin::Pin;

/// Raw request body as received from the transport.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// One upload, as handed over by the HTTP layer.
pub struct UploadRequest {
    /// Raw `key` query parameter.
    pub key: Option<String>,
    pub body: BodyStream,
    pub declared_content_type: Option<String>,
    /// Declared body length, when the client sent one.
    pub content_length: Option<u64>,
    /// `None` when the request carried no valid session.
    pub acting_user: Option<UserRef>,
}

/// What happened to an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadDisposition {
    Stored(StorageObjectMeta),
    /// Identical content already stored; nothing written.
    SkippedDuplicate,
    /// Written, but identical content already existed at `existing_key`.
    StoredDuplicate {
        meta: StorageObjectMeta,
        existing_key: StorageKey,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// The committed key, or the existing key for a skipped duplicate.
    pub key: StorageKey,
    pub disposition: UploadDisposition,
}

impl UploadOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self.disposition, UploadDisposition::SkippedDuplicate)
    }

    pub fn duplicate_of(&self) -> Option<&StorageKey> {
        match self.disposition {
            UploadDisposition::StoredDuplicate {
                ref existing_key, ..
            } => Some(existing_key),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("No authenticated session")]
    Unauthorized,

    #[error("Missing upload key")]
    MissingKey,

    #[error("Invalid upload key: {0}")]
    InvalidKey(#[from] KeyError),

    #[error("Unsupported media type: {content_type}")]
    UnsupportedMediaType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("Payload of {size} bytes exceeds {max} bytes")]
    PayloadTooLarge { size: u64, max: u64 },

    #[error("Duplicate of {existing_key}")]
    DuplicateContent { existing_key: StorageKey },

    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    #[error("Storage write failed")]
    StorageWriteFailed(#[source] StorageError),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Unauthorized => AppError::Unauthorized("No authenticated session".to_string()),
            UploadError::MissingKey => AppError::MissingField("key"),
            UploadError::InvalidKey(e) => AppError::InvalidKey(e.to_string()),
            UploadError::UnsupportedMediaType {
                content_type,
                allowed,
            } => AppError::UnsupportedMediaType {
                content_type,
                allowed,
            },
            UploadError::PayloadTooLarge { size, max } => AppError::PayloadTooLarge { size, max },
            UploadError::DuplicateContent { existing_key } => AppError::DuplicateContent {
                existing_key: existing_key.into_string(),
            },
            UploadError::MalformedBody(msg) => AppError::BadRequest(msg),
            UploadError::StorageWriteFailed(source) => AppError::UploadFailed(source.to_string()),
        }
    }
}
