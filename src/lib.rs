//! Skimmer: an incremental listing-page crawler
//!
//! This crate walks paginated external listing pages, detects per-page
//! content change by fingerprint comparison, and reconciles the extracted
//! items and tag sets into a SQLite store with idempotent, change-driven
//! writes — all while self-throttling under 429 rate limiting.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod fingerprint;
pub mod output;
pub mod reconcile;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for skimmer operations
#[derive(Debug, Error)]
pub enum SkimmerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Extraction error for {url}: {source}")]
    Extract {
        url: String,
        source: extract::ExtractError,
    },

    #[error("Item on {listing_url} has no canonicalizable identity: {item_url}")]
    MissingIdentity {
        listing_url: String,
        item_url: String,
    },

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector in config: {0}")]
    InvalidSelector(String),
}

/// Result type alias for skimmer operations
pub type Result<T> = std::result::Result<T, SkimmerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{crawl, CrawlSummary};
pub use extract::{Extraction, Extractor, ObservedItem};
pub use url::canonicalize;
