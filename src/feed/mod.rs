//! Article aggregation and RSS generation.
//!
//! - [`fetcher`] - One HTTP GET per page against the upstream listing API
//! - [`aggregator`] - Sequential page walk with a fixed inter-page delay
//! - [`builder`] - RSS 2.0 serialization of the collected records
//!
//! # Example
//!
//! ```ignore
//! use quji_rss::{config::Config, feed::generate_feed};
//!
//! let config = Config::load(path)?;
//! let xml = generate_feed(&reqwest::Client::new(), &config).await?;
//! ```

mod aggregator;
mod builder;
mod fetcher;
mod types;

pub use aggregator::aggregate;
pub use builder::{build, BuildError, MalformedRecordError, RSS_CONTENT_TYPE};
pub use fetcher::{FetchError, PageFetcher, PageSource};
pub use types::{ArticleRecord, PageResponse, RecordId};

use thiserror::Error;

use crate::config::{Config, ConfigError};

/// Anything that can fail a feed-generation request.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("Failed to fetch articles: {0}")]
    Fetch(#[from] FetchError),
    #[error("Failed to build feed: {0}")]
    Build(#[from] BuildError),
}

/// Walks every upstream page and renders the result as RSS 2.0 XML.
///
/// Uses the configured page delay, page cap and channel metadata. Any fetch
/// or build failure fails the whole request; no partial feed is returned.
pub async fn generate_feed(client: &reqwest::Client, config: &Config) -> Result<String, FeedError> {
    let fetcher = PageFetcher::new(client.clone(), config)?;
    let records = aggregate(&fetcher, config.page_delay(), config.max_pages).await?;
    let xml = build(&config.channel, &records)?;

    tracing::info!(items = records.len(), bytes = xml.len(), "Generated RSS feed");
    Ok(xml)
}
