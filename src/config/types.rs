use serde::Deserialize;

/// Main configuration structure for skimmer
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub source: SourceConfig,
    pub output: OutputConfig,
}

/// Crawler throttling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Minimum time between dispatches, end of one to start of the next
    /// (milliseconds)
    #[serde(rename = "min-interval-ms", default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Initial backoff after a 429 without a Retry-After hint
    /// (milliseconds); doubles on each consecutive 429 within one dispatch
    #[serde(rename = "backoff-base-ms", default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_min_interval_ms() -> u64 {
    1000
}

fn default_backoff_base_ms() -> u64 {
    60_000
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// One source site's listing chain and extraction selectors
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Short name used in logs
    pub name: String,

    /// First listing page of the pagination chain
    #[serde(rename = "start-url")]
    pub start_url: String,

    /// CSS selectors driving extraction for this source
    pub selectors: SelectorConfig,
}

/// CSS selectors for the generic extractor
///
/// `item` and `identity` are required; everything else is optional and
/// extracted as absent when missing.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Matches one item container on the listing page
    pub item: String,

    /// Matches the item's identity link (href), scoped to the container
    pub identity: String,

    pub description: Option<String>,

    pub language: Option<String>,

    /// Matches a timestamp element (`datetime` attribute or RFC 3339 text)
    pub updated: Option<String>,

    /// Matches zero or more tag labels per item
    pub tags: Option<String>,

    /// Matches the next-page link on the listing page
    #[serde(rename = "next-page")]
    pub next_page: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}
