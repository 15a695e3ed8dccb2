//! Chronoframe Processing Library
//!
//! The photo ingestion path: content type resolution, upload policy,
//! fingerprinting, and the upload pipeline that ties them to a storage backend.

pub mod content_type;
pub mod fingerprint;
pub mod policy;
pub mod upload;

pub use content_type::ContentTypeResolver;
pub use fingerprint::{FingerprintHasher, Fingerprinter, Sha256Fingerprinter};
pub use policy::{Allowance, Decision, Rejection, UploadPolicy};
pub use upload::{
    UploadDisposition, UploadError, UploadOutcome, UploadPipeline, UploadRequest,
};
