//! PostgreSQL storage backend.
#![allow(clippy::needless_raw_string_hashes)]

use super::{FieldMap, PersistentStorage, StorageConfig, StorageResult, StoredBlock};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    Row,
    postgres::{PgPool, PgPoolOptions},
};
use std::time::Duration;

/// Persisted store backed by a PostgreSQL connection pool
#[derive(Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    /// Connect a new pool
    ///
    /// # Arguments
    ///
    /// * `config` - Storage configuration
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use egm_core::storage::{PgStorage, StorageConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), egm_core::storage::StorageError> {
    ///     let storage = PgStorage::connect(&StorageConfig::from_env()).await?;
    ///     storage.migrate().await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn connect(config: &StorageConfig) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create the block tables if they do not exist yet
    pub async fn migrate(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS persisted_blocks (
                block_name TEXT PRIMARY KEY,
                version BIGINT NOT NULL,
                updated_at TIMESTAMP NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS persisted_fields (
                block_name TEXT NOT NULL REFERENCES persisted_blocks (block_name),
                field_name TEXT NOT NULL,
                value JSONB NOT NULL,
                PRIMARY KEY (block_name, field_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Check if the database connection is healthy
    pub async fn health_check(&self) -> StorageResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl PersistentStorage for PgStorage {
    async fn read_block(&self, block: &str) -> StorageResult<Option<StoredBlock>> {
        // Version and fields must come from the same snapshot
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ READ ONLY")
            .execute(&mut *tx)
            .await?;

        let Some(row) = sqlx::query("SELECT version FROM persisted_blocks WHERE block_name = $1")
            .bind(block)
            .fetch_optional(&mut *tx)
            .await?
        else {
            tx.commit().await?;
            return Ok(None);
        };
        let version: i64 = row.get("version");

        let rows = sqlx::query(
            "SELECT field_name, value FROM persisted_fields WHERE block_name = $1",
        )
        .bind(block)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let fields = rows
            .into_iter()
            .map(|row| (row.get::<String, _>("field_name"), row.get::<Value, _>("value")))
            .collect::<FieldMap>();

        Ok(Some(StoredBlock {
            name: block.to_string(),
            version: u64::try_from(version).unwrap_or_default(),
            fields,
        }))
    }

    async fn commit(&self, block: &str, writes: FieldMap) -> StorageResult<u64> {
        let mut tx = self.pool.begin().await?;

        // Row lock on the block serializes concurrent commits
        let row = sqlx::query(
            "INSERT INTO persisted_blocks (block_name, version, updated_at)
             VALUES ($1, 1, NOW())
             ON CONFLICT (block_name)
             DO UPDATE SET
                version = persisted_blocks.version + 1,
                updated_at = NOW()
             RETURNING version",
        )
        .bind(block)
        .fetch_one(&mut *tx)
        .await?;
        let version: i64 = row.get("version");

        for (field, value) in writes {
            sqlx::query(
                "INSERT INTO persisted_fields (block_name, field_name, value)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (block_name, field_name)
                 DO UPDATE SET value = EXCLUDED.value",
            )
            .bind(block)
            .bind(field)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(u64::try_from(version).unwrap_or_default())
    }
}
