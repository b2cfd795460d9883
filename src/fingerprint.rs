//! Content change detection
//!
//! A listing page's extracted record set is hashed into a fixed-length
//! fingerprint; comparing it against the last stored fingerprint decides
//! whether reconciliation needs to run at all. The serialization is
//! deterministic and order-sensitive, so re-fetching identical logical
//! content always yields an identical fingerprint.

use crate::extract::ObservedItem;
use sha2::{Digest, Sha256};

/// Result of comparing a page against its stored fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeCheck {
    /// Whether downstream reconciliation is needed
    pub changed: bool,
    /// Fingerprint of the freshly extracted content
    pub fingerprint: String,
}

/// Computes the fingerprint of an extracted record set
///
/// Fields are fed to the hasher in a fixed order with explicit separators
/// so that, e.g., `("ab", "c")` and `("a", "bc")` cannot collide.
pub fn fingerprint_items(items: &[ObservedItem]) -> String {
    const FIELD_SEP: &[u8] = &[0x1f];
    const ITEM_SEP: &[u8] = &[0x1e];

    let mut hasher = Sha256::new();
    for item in items {
        hasher.update(item.identity_url.as_bytes());
        hasher.update(FIELD_SEP);
        hasher.update(item.description.as_deref().unwrap_or("").as_bytes());
        hasher.update(FIELD_SEP);
        hasher.update(item.language.as_deref().unwrap_or("").as_bytes());
        hasher.update(FIELD_SEP);
        if let Some(at) = item.last_activity_at {
            hasher.update(at.to_rfc3339().as_bytes());
        }
        hasher.update(FIELD_SEP);
        for tag in &item.tags {
            hasher.update(tag.as_bytes());
            hasher.update(FIELD_SEP);
        }
        hasher.update(ITEM_SEP);
    }
    hex::encode(hasher.finalize())
}

/// Compares freshly extracted content against the stored fingerprint
///
/// `changed` is true when no prior fingerprint exists or the fingerprints
/// differ. Side-effect free; the caller persists the new fingerprint.
pub fn detect_change(stored: Option<&str>, items: &[ObservedItem]) -> ChangeCheck {
    let fingerprint = fingerprint_items(items);
    let changed = stored != Some(fingerprint.as_str());
    ChangeCheck {
        changed,
        fingerprint,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(url: &str, tags: &[&str]) -> ObservedItem {
        ObservedItem {
            identity_url: url.to_string(),
            description: Some("desc".to_string()),
            language: Some("Rust".to_string()),
            last_activity_at: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_identical_content_same_fingerprint() {
        let a = [item("https://example.com/a", &["x", "y"])];
        let b = [item("https://example.com/a", &["x", "y"])];
        assert_eq!(fingerprint_items(&a), fingerprint_items(&b));
    }

    #[test]
    fn test_field_change_changes_fingerprint() {
        let a = [item("https://example.com/a", &[])];
        let mut changed = item("https://example.com/a", &[]);
        changed.description = Some("other".to_string());
        assert_ne!(fingerprint_items(&a), fingerprint_items(&[changed]));
    }

    #[test]
    fn test_order_sensitive() {
        let ab = [item("https://example.com/a", &[]), item("https://example.com/b", &[])];
        let ba = [item("https://example.com/b", &[]), item("https://example.com/a", &[])];
        assert_ne!(fingerprint_items(&ab), fingerprint_items(&ba));
    }

    #[test]
    fn test_tag_boundaries_do_not_collide() {
        let a = [item("https://example.com/a", &["ab", "c"])];
        let b = [item("https://example.com/a", &["a", "bc"])];
        assert_ne!(fingerprint_items(&a), fingerprint_items(&b));
    }

    #[test]
    fn test_no_prior_fingerprint_is_changed() {
        let check = detect_change(None, &[item("https://example.com/a", &[])]);
        assert!(check.changed);
    }

    #[test]
    fn test_matching_fingerprint_is_unchanged() {
        let items = [item("https://example.com/a", &["x"])];
        let first = detect_change(None, &items);
        let second = detect_change(Some(&first.fingerprint), &items);

        assert!(!second.changed);
        assert_eq!(first.fingerprint, second.fingerprint);
    }

    #[test]
    fn test_stale_fingerprint_is_changed() {
        let items = [item("https://example.com/a", &["x"])];
        let check = detect_change(Some("deadbeef"), &items);
        assert!(check.changed);
    }

    #[test]
    fn test_fingerprint_is_fixed_length_hex() {
        let fp = fingerprint_items(&[item("https://example.com/a", &[])]);
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
