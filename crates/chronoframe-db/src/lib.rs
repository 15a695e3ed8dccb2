//! Chronoframe DB Library
//!
//! Photo metadata the ingestion pipeline reads and writes: the content
//! fingerprint index used for duplicate detection.

pub mod db;

pub use db::{connect, InMemoryPhotoIndex, PhotoIndex, SqlitePhotoIndex, UploadRecord};
