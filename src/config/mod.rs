//! Environment-driven service configuration
//!
//! Values come from the process environment (optionally seeded from a `.env`
//! file by `dotenvy` in `main`). Every setting has a default so the service
//! starts against local Redis and a SQLite file without any setup.

use std::env::VarError;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:database/products.db";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";
pub const DEFAULT_ARTIFACT_DIR: &str = "debug-artifacts";
pub const DEFAULT_CACHE_TTL_SECS: u64 = 60 * 60;
pub const DEFAULT_STORE_TTL_DAYS: i64 = 30;
pub const DEFAULT_PURGE_SCHEDULE: &str = "0 0 * * * *";

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub redis_url: String,
    /// Browser executable; `None` lets chromiumoxide locate one.
    pub chrome_path: Option<PathBuf>,
    pub artifact_dir: PathBuf,
    pub cache_ttl: Duration,
    pub store_ttl: chrono::Duration,
    pub purge_schedule: String,
    pub log_level: String,
}

impl Config {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        build_config(|key| std::env::var(key))
    }
}

/// Build a [`Config`] from an arbitrary variable lookup.
pub fn build_config<F>(lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let get = |key: &str| lookup(key).ok().filter(|v| !v.trim().is_empty());

    let bind_addr = parse_or(&get, "BIND_ADDR", DEFAULT_BIND_ADDR)?;
    let cache_ttl_secs: u64 = parse_or(&get, "CACHE_TTL_SECS", &DEFAULT_CACHE_TTL_SECS.to_string())?;
    let store_ttl_days: i64 = parse_or(&get, "STORE_TTL_DAYS", &DEFAULT_STORE_TTL_DAYS.to_string())?;

    if store_ttl_days <= 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "STORE_TTL_DAYS".to_string(),
            reason: "must be a positive number of days".to_string(),
        });
    }

    Ok(Config {
        bind_addr,
        database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
        redis_url: get("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
        chrome_path: get("CHROME_PATH").map(PathBuf::from),
        artifact_dir: get("DEBUG_ARTIFACT_DIR")
            .map_or_else(|| PathBuf::from(DEFAULT_ARTIFACT_DIR), PathBuf::from),
        cache_ttl: Duration::from_secs(cache_ttl_secs),
        store_ttl: chrono::Duration::days(store_ttl_days),
        purge_schedule: get("PURGE_SCHEDULE")
            .unwrap_or_else(|| DEFAULT_PURGE_SCHEDULE.to_string()),
        log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
    })
}

fn parse_or<T, G>(get: &G, var: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    let raw = get(var).unwrap_or_else(|| default.to_string());
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason: e.to_string(),
    })
}
