//! Photo index setup

use anyhow::{Context, Result};
use chronoframe_core::Config;
use chronoframe_db::{connect, InMemoryPhotoIndex, PhotoIndex, SqlitePhotoIndex};
use std::sync::Arc;

/// SQLite-backed index when `DATABASE_URL` is set, otherwise an in-process one.
pub async fn setup_photo_index(config: &Config) -> Result<Arc<dyn PhotoIndex>> {
    match config.base.database_url {
        Some(ref url) => {
            let pool = connect(url)
                .await
                .context("Failed to connect to photo index database")?;
            tracing::info!("Photo index connected and migrated");
            Ok(Arc::new(SqlitePhotoIndex::new(pool)))
        }
        None => {
            tracing::warn!(
                "DATABASE_URL not set, duplicate detection uses an in-memory index that is lost on restart"
            );
            Ok(Arc::new(InMemoryPhotoIndex::new()))
        }
    }
}
