//! SQLite-backed metadata repository.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{FromRow, Pool, Sqlite};
use tracing::{debug, info};

use crate::domain::{ImageMetadata, MetadataRepository, MetadataResult, ObjectHash};

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS image_metadata (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    original_url TEXT NOT NULL,
    object_hash TEXT NOT NULL UNIQUE,
    checksum TEXT NOT NULL,
    original_size INTEGER NOT NULL,
    optimized_size INTEGER NOT NULL,
    original_mime TEXT NOT NULL,
    optimized_mime TEXT NOT NULL,
    created_at TEXT NOT NULL
)";

const URL_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_image_metadata_original_url ON image_metadata (original_url)";

const SELECT_COLUMNS: &str = "SELECT original_url, object_hash, checksum, original_size, \
     optimized_size, original_mime, optimized_mime, created_at FROM image_metadata";

#[derive(Debug, FromRow)]
struct MetadataRow {
    original_url: String,
    object_hash: String,
    checksum: String,
    original_size: i64,
    optimized_size: i64,
    original_mime: String,
    optimized_mime: String,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
}

impl From<MetadataRow> for ImageMetadata {
    fn from(row: MetadataRow) -> Self {
        Self {
            original_url: row.original_url,
            object_hash: ObjectHash::new(row.object_hash),
            checksum: row.checksum,
            original_mime_type: row.original_mime,
            original_size: u64::try_from(row.original_size).unwrap_or_default(),
            optimized_size: u64::try_from(row.optimized_size).unwrap_or_default(),
            optimized_mime_type: row.optimized_mime,
        }
    }
}

/// Metadata repository stored in a single SQLite file.
pub struct SqliteMetadataRepository {
    pool: Pool<Sqlite>,
}

impl SqliteMetadataRepository {
    /// Opens (or creates) the database at `path` and applies the schema.
    ///
    /// # Errors
    /// Returns error if the file cannot be created or the schema cannot be applied.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let repo = Self { pool };
        repo.migrate().await?;
        info!(path = %path.display(), "Opened metadata database");
        Ok(repo)
    }

    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        sqlx::query(URL_INDEX).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl MetadataRepository for SqliteMetadataRepository {
    async fn insert_ignore(&self, metadata: &ImageMetadata) -> MetadataResult<()> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO image_metadata (original_url, object_hash, checksum, \
             original_size, optimized_size, original_mime, optimized_mime, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&metadata.original_url)
        .bind(metadata.object_hash.as_str())
        .bind(&metadata.checksum)
        .bind(i64::try_from(metadata.original_size).unwrap_or(i64::MAX))
        .bind(i64::try_from(metadata.optimized_size).unwrap_or(i64::MAX))
        .bind(&metadata.original_mime_type)
        .bind(&metadata.optimized_mime_type)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(hash = %metadata.object_hash, "Metadata row already present");
        }
        Ok(())
    }

    async fn find_by_hash(&self, hash: &ObjectHash) -> MetadataResult<Option<ImageMetadata>> {
        let row = sqlx::query_as::<_, MetadataRow>(&format!("{SELECT_COLUMNS} WHERE object_hash = ?"))
            .bind(hash.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Into::into))
    }

    async fn find_by_url(&self, original_url: &str) -> MetadataResult<Vec<ImageMetadata>> {
        let rows = sqlx::query_as::<_, MetadataRow>(&format!(
            "{SELECT_COLUMNS} WHERE original_url = ? ORDER BY id"
        ))
        .bind(original_url)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn delete_by_hash(&self, hash: &ObjectHash) -> MetadataResult<()> {
        sqlx::query("DELETE FROM image_metadata WHERE object_hash = ?")
            .bind(hash.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        debug!("Closed metadata database");
    }
}

/// Returns the default database path.
#[must_use]
pub fn default_database_path() -> PathBuf {
    directories::ProjectDirs::from("org", "optiproxy", "optiproxy").map_or_else(
        || std::env::temp_dir().join("optiproxy").join("metadata.db"),
        |dirs| dirs.data_dir().join("metadata.db"),
    )
}
