//! Storage setup and initialization

use anyhow::{Context, Result};
use chronoframe_core::Config;
use chronoframe_storage::{create_storage, Storage};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!(provider = %config.storage_provider(), "Initializing storage provider...");

    let storage = create_storage(&config.storage)
        .await
        .context("Failed to initialize storage provider")?;

    tracing::info!(
        backend = %storage.backend_type(),
        "Storage provider initialized successfully"
    );
    Ok(storage)
}
