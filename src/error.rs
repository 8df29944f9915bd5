//! Error types for the scraping, caching and storage layers

use std::time::Duration;

use thiserror::Error;

/// Failure of a single retailer extraction. Any of these fails the whole
/// source for the current request.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("missing search term")]
    EmptyTerm,

    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("navigation to {url} timed out after {}s", .timeout.as_secs())]
    NavigationTimeout { url: String, timeout: Duration },

    #[error("timed out after {}s waiting for selector `{selector}`", .timeout.as_secs())]
    SelectorTimeout { selector: String, timeout: Duration },

    #[error("browser operation failed: {0}")]
    Browser(String),

    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    #[error("failed to write debug artifact: {0}")]
    Artifact(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("cache payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("stored products are not valid JSON: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
