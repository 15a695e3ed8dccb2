pub mod storage;
pub mod upload;

pub use storage::{KeyError, StorageKey, StorageObjectMeta};
pub use upload::{ContentType, DuplicateMode, DuplicatePolicy, Fingerprint, UserRef};
