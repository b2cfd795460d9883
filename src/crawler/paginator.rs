//! Page-by-page traversal of a listing chain
//!
//! The paginator drives one sequential stream of dispatches: fetch the
//! current listing URL through the rate limiter, extract, detect change,
//! reconcile, then follow the next-page pointer until the chain ends.
//! Traversal is an explicit loop over a mutable current-URL variable, so
//! arbitrarily long chains cannot grow the call stack.

use crate::crawler::limiter::RateLimiter;
use crate::extract::Extractor;
use crate::fingerprint::detect_change;
use crate::reconcile::reconcile;
use crate::storage::{ReconcileStats, Storage};
use crate::{Result, SkimmerError};

/// Totals for one crawl run
#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlSummary {
    /// Listing pages visited
    pub pages_visited: u64,
    /// Pages whose fingerprint differed from the stored one
    pub pages_changed: u64,
    /// Pages whose dispatch hit at least one 429
    pub pages_rate_limited: u64,
    /// Accumulated item/tag write counts
    pub stats: ReconcileStats,
}

/// Drives the crawl over one listing chain
pub struct Paginator<'a, S: Storage, E: Extractor> {
    limiter: &'a mut RateLimiter,
    storage: &'a mut S,
    extractor: &'a E,
}

impl<'a, S: Storage, E: Extractor> Paginator<'a, S, E> {
    pub fn new(limiter: &'a mut RateLimiter, storage: &'a mut S, extractor: &'a E) -> Self {
        Self {
            limiter,
            storage,
            extractor,
        }
    }

    /// Visits every page of the chain starting at `start_url`
    ///
    /// A page's reconciliation completes before the next page's dispatch
    /// begins. Any error halts the crawl at the current URL and
    /// propagates; pages already reconciled stay committed.
    pub async fn run(&mut self, start_url: &str) -> Result<CrawlSummary> {
        let mut summary = CrawlSummary::default();
        let mut current = Some(start_url.to_string());

        while let Some(url) = current.take() {
            tracing::debug!(url = %url, page = summary.pages_visited + 1, "visiting listing page");

            let page = self.limiter.dispatch(self.storage, &url).await?;
            if self.limiter.was_rate_limited() {
                summary.pages_rate_limited += 1;
            }

            let extraction =
                self.extractor
                    .extract(&page.body, &url)
                    .map_err(|source| SkimmerError::Extract {
                        url: url.clone(),
                        source,
                    })?;

            let stored = self.storage.get_snapshot(&url)?;
            let check = detect_change(
                stored.as_ref().and_then(|s| s.content_fingerprint.as_deref()),
                &extraction.items,
            );

            let outcome = reconcile(self.storage, &url, &check, &extraction.items)?;

            summary.pages_visited += 1;
            if outcome.changed {
                summary.pages_changed += 1;
            }
            summary.stats.add(&outcome.stats);

            current = extraction.next_page_url;
        }

        Ok(summary)
    }
}
