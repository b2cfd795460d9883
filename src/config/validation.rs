//! Configuration validation
//!
//! Catches misconfiguration at load time rather than mid-crawl: the start
//! URL must be a fetchable HTTP(S) URL, every configured CSS selector must
//! parse, and the throttle durations must be meaningful.

use crate::config::types::Config;
use crate::ConfigError;
use url::Url;

/// Validates a parsed configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_start_url(&config.source.start_url)?;
    validate_selectors(config)?;

    if config.crawler.backoff_base_ms == 0 {
        return Err(ConfigError::Validation(
            "backoff-base-ms must be greater than zero".to_string(),
        ));
    }

    if config.user_agent.crawler_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "crawler-name must not be empty".to_string(),
        ));
    }

    if config.output.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database-path must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_start_url(raw: &str) -> Result<(), ConfigError> {
    let url = Url::parse(raw).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} (scheme must be http or https)",
            raw
        )));
    }
    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!("{} (missing host)", raw)));
    }

    Ok(())
}

fn validate_selectors(config: &Config) -> Result<(), ConfigError> {
    let selectors = &config.source.selectors;
    let mut all: Vec<&str> = vec![&selectors.item, &selectors.identity];
    all.extend(selectors.description.as_deref());
    all.extend(selectors.language.as_deref());
    all.extend(selectors.updated.as_deref());
    all.extend(selectors.tags.as_deref());
    all.extend(selectors.next_page.as_deref());

    for raw in all {
        if scraper::Selector::parse(raw).is_err() {
            return Err(ConfigError::InvalidSelector(raw.to_string()));
        }
    }

    Ok(())
}
