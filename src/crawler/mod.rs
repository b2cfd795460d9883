//! Crawler core: rate-limited dispatch and pagination
//!
//! `crawl` wires the pieces together for one configured source: HTTP
//! client, storage, extractor, rate limiter, paginator.

mod limiter;
mod paginator;

pub use limiter::{build_http_client, BackoffState, FetchedPage, RateLimiter};
pub use paginator::{CrawlSummary, Paginator};

use crate::config::Config;
use crate::extract::SelectorExtractor;
use crate::storage::open_storage;
use crate::{ConfigError, Result};
use std::path::Path;
use std::time::Duration;

/// Runs one full crawl of the configured listing chain
pub async fn crawl(config: Config) -> Result<CrawlSummary> {
    let client = build_http_client(&config.user_agent)?;
    let mut storage = open_storage(Path::new(&config.output.database_path))?;
    let extractor = SelectorExtractor::from_config(&config.source.selectors)
        .map_err(|e| ConfigError::InvalidSelector(e.to_string()))?;

    let mut limiter = RateLimiter::new(
        client,
        Duration::from_millis(config.crawler.min_interval_ms),
        Duration::from_millis(config.crawler.backoff_base_ms),
    );

    tracing::info!(
        source = %config.source.name,
        start_url = %config.source.start_url,
        "starting crawl"
    );

    let mut paginator = Paginator::new(&mut limiter, &mut storage, &extractor);
    let summary = paginator.run(&config.source.start_url).await?;

    tracing::info!(
        pages_visited = summary.pages_visited,
        pages_changed = summary.pages_changed,
        pages_rate_limited = summary.pages_rate_limited,
        items_created = summary.stats.items_created,
        items_updated = summary.stats.items_updated,
        tags_linked = summary.stats.tags_linked,
        tags_unlinked = summary.stats.tags_unlinked,
        "crawl completed"
    );

    Ok(summary)
}
