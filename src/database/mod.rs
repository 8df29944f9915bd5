use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::error::StoreError;
use crate::models::ProductRecord;
use crate::normalize::normalize_query;

/// Long-lived product store consulted after a fast-cache miss.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Most recent unexpired products for `(source, term)`.
    async fn find_products(
        &self,
        source: &str,
        term: &str,
    ) -> Result<Option<Vec<ProductRecord>>, StoreError>;

    async fn save_products(
        &self,
        source: &str,
        term: &str,
        products: &[ProductRecord],
    ) -> Result<(), StoreError>;
}

/// SQLite-backed [`ProductStore`]. Constructed once at startup and shared;
/// the pool does the connection reuse.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    ttl: Duration,
}

impl Database {
    pub async fn connect(url: &str, ttl: Duration) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);

        // every connection to `:memory:` would otherwise see its own database
        let in_memory = url.contains(":memory:");
        let filename = options.clone().get_filename();
        if !in_memory
            && let Some(parent) = filename.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Database(sqlx::Error::Io(e)))?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(options)
            .await?;

        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Database initialized successfully");
        Ok(Self { pool, ttl })
    }

    /// Delete documents older than the store TTL. Returns how many went.
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let cutoff = Utc::now() - self.ttl;
        let result = sqlx::query("DELETE FROM product_cache WHERE updated_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn save_at(
        &self,
        source: &str,
        term: &str,
        products: &[ProductRecord],
        updated_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(products)?;

        sqlx::query(
            r"
            INSERT INTO product_cache (source, search_term, products, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (source, search_term)
            DO UPDATE SET products = excluded.products, updated_at = excluded.updated_at
            ",
        )
        .bind(source)
        .bind(normalize_query(term))
        .bind(json)
        .bind(updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ProductStore for Database {
    async fn find_products(
        &self,
        source: &str,
        term: &str,
    ) -> Result<Option<Vec<ProductRecord>>, StoreError> {
        let cutoff = Utc::now() - self.ttl;

        let row = sqlx::query(
            r"
            SELECT products FROM product_cache
            WHERE source = ? AND search_term = ? AND updated_at >= ?
            ORDER BY updated_at DESC
            LIMIT 1
            ",
        )
        .bind(source)
        .bind(normalize_query(term))
        .bind(cutoff)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            let json = row.get::<String, _>("products");
            serde_json::from_str(&json).map_err(StoreError::from)
        })
        .transpose()
    }

    async fn save_products(
        &self,
        source: &str,
        term: &str,
        products: &[ProductRecord],
    ) -> Result<(), StoreError> {
        self.save_at(source, term, products, Utc::now()).await
    }
}
