//! Chronoframe API Library
//!
//! HTTP surface of the photo ingestion service: the upload endpoint, session
//! extraction, error rendering, and application setup.

pub mod auth;
pub mod error;
mod handlers;
mod middleware;
pub mod setup;
pub mod state;
mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
