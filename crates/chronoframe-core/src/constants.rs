//! Shared constants.

/// Fallback type browsers send when they cannot identify a file.
pub const GENERIC_CONTENT_TYPE: &str = "application/octet-stream";

/// Default upload ceiling in MiB.
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 128;

/// Default in-memory spool size in MiB before spilling to a temp file.
pub const DEFAULT_SPOOL_MEMORY_MB: u64 = 8;

/// Default S3 size above which uploads use multipart.
pub const DEFAULT_S3_MULTIPART_THRESHOLD_MB: u64 = 16;

pub const DEFAULT_SESSION_COOKIE_NAME: &str = "chronoframe-session";
