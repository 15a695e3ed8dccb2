//! SQLite-backed photo index: the `photo_uploads` table.

use async_trait::async_trait;
use chronoframe_core::models::{Fingerprint, StorageKey};
use chronoframe_core::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool};
use std::str::FromStr;

use super::photo_index::{PhotoIndex, UploadRecord};

const MAX_CONNECTIONS: u32 = 5;

/// Open a pool for `database_url` and apply pending migrations.
///
/// In-memory databases are per-connection in SQLite, so they get a single
/// connection to keep one shared schema.
pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let max_connections = if database_url.contains(":memory:") {
        1
    } else {
        MAX_CONNECTIONS
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to run migrations: {}", e)))?;

    tracing::info!(max_connections, "Photo index database ready");

    Ok(pool)
}

/// Repository for the photo_uploads table.
#[derive(Clone)]
pub struct SqlitePhotoIndex {
    pool: SqlitePool,
}

impl SqlitePhotoIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PhotoIndex for SqlitePhotoIndex {
    #[tracing::instrument(skip(self), fields(db.table = "photo_uploads"))]
    async fn find_by_fingerprint(
        &self,
        fingerprint: &Fingerprint,
    ) -> Result<Option<StorageKey>, AppError> {
        let row: Option<(String,)> = sqlx::query_as::<Sqlite, (String,)>(
            r#"
            SELECT storage_key FROM photo_uploads
            WHERE fingerprint = ?
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(fingerprint.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((raw,)) => StorageKey::parse(&raw)
                .map(Some)
                .map_err(|e| AppError::Internal(format!("Corrupt storage key in index: {}", e))),
            None => Ok(None),
        }
    }

    #[tracing::instrument(skip(self, record), fields(db.table = "photo_uploads", key = %record.key))]
    async fn record_upload(&self, record: &UploadRecord) -> Result<(), AppError> {
        sqlx::query::<Sqlite>(
            r#"
            INSERT INTO photo_uploads
                (storage_key, fingerprint, size, content_type, storage_provider, uploaded_by)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT (storage_key) DO UPDATE SET
                fingerprint = excluded.fingerprint,
                size = excluded.size,
                content_type = excluded.content_type,
                storage_provider = excluded.storage_provider,
                uploaded_by = excluded.uploaded_by,
                updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
            "#,
        )
        .bind(record.key.as_str())
        .bind(record.fingerprint.as_str())
        .bind(i64::try_from(record.size).unwrap_or(i64::MAX))
        .bind(&record.content_type)
        .bind(record.storage_provider.to_string())
        .bind(record.uploaded_by)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
