use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use price_finder::aggregator::Aggregator;
use price_finder::api::{build_app, AppState};
use price_finder::browser::{BrowserExtractor, BrowserSettings};
use price_finder::cache::RedisCache;
use price_finder::config::Config;
use price_finder::database::Database;
use price_finder::lookup::CacheAside;
use price_finder::scheduler::build_scheduler;
use price_finder::scrapers::{AmazonScraper, FlipkartScraper};
use price_finder::traits::ProductSource;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    info!("Starting price finder");

    let database = Database::connect(&config.database_url, config.store_ttl).await?;
    let cache = RedisCache::connect(&config.redis_url).await?;
    cache.ping().await?;

    let _scheduler = build_scheduler(database.clone(), &config.purge_schedule).await?;

    let settings = BrowserSettings {
        chrome_path: config.chrome_path.clone(),
        artifact_dir: config.artifact_dir.clone(),
    };
    let sources: Vec<Arc<dyn ProductSource>> = vec![
        Arc::new(BrowserExtractor::new(AmazonScraper::new()?, settings.clone())),
        Arc::new(BrowserExtractor::new(FlipkartScraper::new()?, settings)),
    ];

    let lookup = CacheAside::new(Arc::new(cache), Arc::new(database), config.cache_ttl);
    let app = build_app(AppState {
        aggregator: Aggregator::new(sources, lookup),
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Received shutdown signal, starting graceful shutdown");
}
