//! Product price aggregation across retailer search pages.
//!
//! A search term is normalized, then looked up per retailer through a fast
//! cache, a persistent store and finally a headless-browser scrape.

pub mod aggregator;
pub mod api;
pub mod browser;
pub mod cache;
pub mod config;
pub mod database;
pub mod error;
pub mod lookup;
pub mod models;
pub mod normalize;
pub mod scheduler;
pub mod scrapers;
pub mod traits;
