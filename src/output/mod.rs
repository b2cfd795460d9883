//! Offline diagnostics over the store and the api call log
//!
//! This analysis is a diagnostic tool for operators (the `--stats` CLI
//! mode); nothing here runs on the online crawl path.

use crate::storage::{ApiCallRecord, Storage, StorageResult};
use chrono::DateTime;

/// Row counts for the reconciled store
#[derive(Debug, Clone, Copy)]
pub struct StoreCounts {
    pub snapshots: u64,
    pub items: u64,
    pub tags: u64,
    pub item_tags: u64,
}

/// Loads the store counts used by the stats report
pub fn load_store_counts<S: Storage>(storage: &S) -> StorageResult<StoreCounts> {
    Ok(StoreCounts {
        snapshots: storage.count_snapshots()?,
        items: storage.count_items()?,
        tags: storage.count_tags()?,
        item_tags: storage.count_item_tags()?,
    })
}

/// A run of consecutive rate-limited attempts in the call log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitCluster {
    /// URL of the first 429 in the cluster
    pub first_url: String,
    /// Number of consecutive 429 attempts
    pub length: usize,
}

/// Summary of the api call log
#[derive(Debug, Clone)]
pub struct ApiLogReport {
    /// Physical attempts recorded
    pub total_attempts: usize,
    /// Attempts with a response status
    pub completed: usize,
    /// Attempts that never received a response
    pub failed: usize,
    /// Attempts answered with 429
    pub rate_limited: usize,
    /// Duration distribution over completed attempts (milliseconds)
    pub min_duration_ms: Option<i64>,
    pub avg_duration_ms: Option<i64>,
    pub max_duration_ms: Option<i64>,
    /// Runs of two or more consecutive 429 attempts
    pub clusters: Vec<RateLimitCluster>,
}

impl ApiLogReport {
    /// Builds the report from the call log, in dispatch order
    pub fn from_calls(calls: &[ApiCallRecord]) -> Self {
        let total_attempts = calls.len();
        let completed = calls.iter().filter(|c| c.status.is_some()).count();
        let failed = total_attempts - completed;
        let rate_limited = calls.iter().filter(|c| c.status == Some(429)).count();

        let durations: Vec<i64> = calls.iter().filter_map(call_duration_ms).collect();
        let (min, avg, max) = if durations.is_empty() {
            (None, None, None)
        } else {
            let sum: i64 = durations.iter().sum();
            (
                durations.iter().min().copied(),
                Some(sum / durations.len() as i64),
                durations.iter().max().copied(),
            )
        };

        Self {
            total_attempts,
            completed,
            failed,
            rate_limited,
            min_duration_ms: min,
            avg_duration_ms: avg,
            max_duration_ms: max,
            clusters: find_clusters(calls),
        }
    }
}

/// Milliseconds between a call's start and end, when both parse
fn call_duration_ms(call: &ApiCallRecord) -> Option<i64> {
    let start = DateTime::parse_from_rfc3339(&call.start_time).ok()?;
    let end = DateTime::parse_from_rfc3339(call.end_time.as_deref()?).ok()?;
    Some((end - start).num_milliseconds())
}

/// Finds runs of two or more consecutive 429 attempts
///
/// Clusters indicate sustained throttling rather than a one-off limit;
/// they are the first thing to look at when a crawl ran slowly.
fn find_clusters(calls: &[ApiCallRecord]) -> Vec<RateLimitCluster> {
    let mut clusters = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, call) in calls.iter().enumerate() {
        if call.status == Some(429) {
            run_start.get_or_insert(i);
        } else if let Some(start) = run_start.take() {
            if i - start >= 2 {
                clusters.push(RateLimitCluster {
                    first_url: calls[start].url.clone(),
                    length: i - start,
                });
            }
        }
    }
    if let Some(start) = run_start {
        if calls.len() - start >= 2 {
            clusters.push(RateLimitCluster {
                first_url: calls[start].url.clone(),
                length: calls.len() - start,
            });
        }
    }

    clusters
}

/// Prints the stats report to stdout
pub fn print_report(counts: &StoreCounts, report: &ApiLogReport) {
    println!("=== Store ===");
    println!("  Listing snapshots: {}", counts.snapshots);
    println!("  Items:             {}", counts.items);
    println!("  Tags:              {}", counts.tags);
    println!("  Tag links:         {}", counts.item_tags);

    println!("\n=== Api call log ===");
    println!("  Attempts:     {}", report.total_attempts);
    println!("  Completed:    {}", report.completed);
    println!("  No response:  {}", report.failed);
    println!("  Rate limited: {}", report.rate_limited);

    if let (Some(min), Some(avg), Some(max)) = (
        report.min_duration_ms,
        report.avg_duration_ms,
        report.max_duration_ms,
    ) {
        println!("  Duration ms:  min {} / avg {} / max {}", min, avg, max);
    }

    if report.clusters.is_empty() {
        println!("  No 429 clusters");
    } else {
        println!("\n=== 429 clusters ===");
        for cluster in &report.clusters {
            println!("  {} consecutive, starting at {}", cluster.length, cluster.first_url);
        }
    }
}
