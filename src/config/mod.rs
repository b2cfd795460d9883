//! Configuration loading and validation
//!
//! Skimmer is configured from a single TOML file: crawler throttling,
//! user-agent identification, the source site's listing chain and
//! extraction selectors, and output paths.

mod parser;
mod types;
mod validation;

pub use parser::load_config;
pub use types::{
    Config, CrawlerConfig, OutputConfig, SelectorConfig, SourceConfig, UserAgentConfig,
};
pub use validation::validate;
