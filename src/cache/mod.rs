//! Fast cache tier backed by Redis

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::info;

use crate::error::CacheError;
use crate::models::ProductRecord;

/// Key under which a source's products for a normalized term are cached.
pub fn cache_key(source: &str, term: &str) -> String {
    format!("products:{source}:{term}")
}

/// Short-lived product cache consulted before the persistent store.
#[async_trait]
pub trait FastCache: Send + Sync {
    async fn get_products(&self, key: &str) -> Result<Option<Vec<ProductRecord>>, CacheError>;

    async fn set_products(
        &self,
        key: &str,
        products: &[ProductRecord],
        ttl: Duration,
    ) -> Result<(), CacheError>;
}

/// Redis-backed [`FastCache`]. The connection manager reconnects on its own
/// and is cheap to clone, so one instance is shared by all requests.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to Redis");
        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl FastCache for RedisCache {
    async fn get_products(&self, key: &str) -> Result<Option<Vec<ProductRecord>>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;

        raw.map(|json| serde_json::from_str(&json).map_err(CacheError::from))
            .transpose()
    }

    async fn set_products(
        &self,
        key: &str,
        products: &[ProductRecord],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let json = serde_json::to_string(products)?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, json, ttl.as_secs().max(1)).await?;
        Ok(())
    }
}
