//! Listing scraper for portalinmobiliario.com.
//!
//! Three stages feed each other: [`scrapers::UrlDiscovery`] paginates search
//! results, [`scrapers::ListingExtractor`] turns listing pages into
//! [`models::ListingRecord`]s, and [`store::ListingStore`] merges them into a
//! CSV table that survives interrupted runs. [`pipeline`] wires them up.

pub mod config;
pub mod error;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod scrapers;
pub mod store;

pub use config::ScrapeConfig;
pub use error::ScoutError;
pub use models::ListingRecord;
pub use pipeline::{run_address_enrichment, run_scrape, AddressJob, ScrapeJob};
