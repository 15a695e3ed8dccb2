//! Upload ingestion: body spooling, per-key locking, and the pipeline itself.

pub mod locks;
pub mod pipeline;
pub mod spool;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use locks::KeyLocks;
pub use pipeline::UploadPipeline;
pub use spool::{spool, SpoolError, SpooledPayload};
pub use types::{BodyStream, UploadDisposition, UploadError, UploadOutcome, UploadRequest};
