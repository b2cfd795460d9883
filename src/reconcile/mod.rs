//! Listing reconciliation
//!
//! Turns one listing page's observed items into idempotent store writes.
//! Identities are canonicalized and validated before any write begins:
//! an item with no canonicalizable identity would corrupt the uniqueness
//! invariant, so it aborts the whole page with nothing committed.

use crate::extract::ObservedItem;
use crate::fingerprint::ChangeCheck;
use crate::storage::{CanonicalItem, ReconcileStats, Storage};
use crate::url::canonicalize;
use crate::{Result, SkimmerError};
use chrono::Utc;

/// Outcome of reconciling one listing page
#[derive(Debug, Clone, Copy)]
pub struct PageOutcome {
    /// Whether the page's fingerprint differed from the stored one
    pub changed: bool,
    /// Item/tag write counts; all zero for an unchanged page
    pub stats: ReconcileStats,
}

/// Reconciles one listing page against the store
///
/// For an unchanged page only `last_checked_at` moves; no Item, Tag or
/// ItemTag write occurs. For a changed page the snapshot upsert, item
/// upserts and tag-set reconciliation commit as one transaction.
pub fn reconcile<S: Storage>(
    storage: &mut S,
    listing_url: &str,
    check: &ChangeCheck,
    observed: &[ObservedItem],
) -> Result<PageOutcome> {
    if !check.changed {
        storage.touch_snapshot(listing_url, Utc::now())?;
        tracing::debug!(url = listing_url, "listing unchanged, touched check timestamp");
        return Ok(PageOutcome {
            changed: false,
            stats: ReconcileStats::default(),
        });
    }

    // Canonicalize everything up front so a malformed identity aborts
    // before the first write.
    let items = canonicalize_items(listing_url, observed)?;

    let stats = storage.apply_listing(listing_url, &check.fingerprint, &items, Utc::now())?;
    tracing::info!(
        url = listing_url,
        items_created = stats.items_created,
        items_updated = stats.items_updated,
        tags_linked = stats.tags_linked,
        tags_unlinked = stats.tags_unlinked,
        "listing reconciled"
    );

    Ok(PageOutcome {
        changed: true,
        stats,
    })
}

fn canonicalize_items(
    listing_url: &str,
    observed: &[ObservedItem],
) -> Result<Vec<CanonicalItem>> {
    observed
        .iter()
        .map(|item| {
            let identity_url =
                canonicalize(&item.identity_url).ok_or_else(|| SkimmerError::MissingIdentity {
                    listing_url: listing_url.to_string(),
                    item_url: item.identity_url.clone(),
                })?;
            Ok(CanonicalItem {
                identity_url,
                description: item.description.clone(),
                language: item.language.clone(),
                last_activity_at: item.last_activity_at,
                tags: item.tags.clone(),
            })
        })
        .collect()
}
