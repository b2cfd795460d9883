//! Skimmer main entry point
//!
//! Command-line interface for the incremental listing crawler.

use anyhow::Context;
use clap::Parser;
use skimmer::config::load_config;
use skimmer::crawler::crawl;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Skimmer: an incremental listing-page crawler
///
/// Skimmer walks a paginated listing chain, skips pages whose content has
/// not changed since the last visit, and reconciles extracted items and
/// tag sets into a SQLite store.
#[derive(Parser, Debug)]
#[command(name = "skimmer")]
#[command(version)]
#[command(about = "An incremental listing-page crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show store counts and the api call log report, then exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("skimmer=info,warn"),
            1 => EnvFilter::new("skimmer=debug,info"),
            2 => EnvFilter::new("skimmer=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --dry-run: validates config and shows the crawl plan
fn handle_dry_run(config: &skimmer::Config) {
    println!("=== Skimmer Dry Run ===\n");

    println!("Source: {}", config.source.name);
    println!("  Start URL: {}", config.source.start_url);
    println!("  Item selector:     {}", config.source.selectors.item);
    println!("  Identity selector: {}", config.source.selectors.identity);
    if let Some(next) = &config.source.selectors.next_page {
        println!("  Next-page selector: {}", next);
    } else {
        println!("  Next-page selector: (none; single page)");
    }

    println!("\nThrottle:");
    println!("  Min interval: {}ms", config.crawler.min_interval_ms);
    println!("  Backoff base: {}ms", config.crawler.backoff_base_ms);

    println!("\nUser Agent:");
    println!(
        "  {}/{} (+{}; {})",
        config.user_agent.crawler_name,
        config.user_agent.crawler_version,
        config.user_agent.contact_url,
        config.user_agent.contact_email
    );

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    println!("\n✓ Configuration is valid");
}

/// Handles --stats: prints store counts and the api call log report
fn handle_stats(config: &skimmer::Config) -> anyhow::Result<()> {
    use skimmer::output::{load_store_counts, print_report, ApiLogReport};
    use skimmer::storage::{open_storage, Storage};
    use std::path::Path;

    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))?;
    let counts = load_store_counts(&storage)?;
    let report = ApiLogReport::from_calls(&storage.list_api_calls()?);

    print_report(&counts, &report);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: skimmer::Config) -> anyhow::Result<()> {
    match crawl(config).await {
        Ok(summary) => {
            tracing::info!(
                "Crawl completed: {} pages visited, {} changed",
                summary.pages_visited,
                summary.pages_changed
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl halted: {}", e);
            Err(e.into())
        }
    }
}
