//! Database repositories for data access layer
//
// Duplicate-detection index and its implementations
pub mod memory;
pub mod photo_index;
pub mod sqlite;

pub use memory::InMemoryPhotoIndex;
pub use photo_index::{PhotoIndex, UploadRecord};
pub use sqlite::{connect, SqlitePhotoIndex};
